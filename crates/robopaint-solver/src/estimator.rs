//! Region color estimation and the per-solve color cache.
//!
//! This module defines the [`ColorEstimator`] trait for pluggable color
//! estimation and the [`EstimatorKind`] enum for selecting which strategy
//! to use from configuration.
//!
//! # Strategy pattern
//!
//! The exact estimator rescans every pixel of a region; the quad-tree
//! estimator combines precomputed medians of covering nodes. Both answer the
//! same question, so the optimizer only sees [`ColorCache`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::geometry::{GeometryError, Shape};
use crate::median::geometric_median;
use crate::quad_tree::QuadTree;
use crate::types::{Color, SolverConfig};

/// Selects which color estimator the block optimizer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EstimatorKind {
    /// Geometric median over every pixel of the region.
    #[default]
    Exact,
    /// Geometric median combined from a precomputed quad-tree for large
    /// regions, exact for small ones.
    QuadTree,
}

/// Trait for region color estimation strategies.
pub trait ColorEstimator {
    /// Robust representative color of `shape` on `canvas`.
    fn estimate(&self, canvas: &Canvas, shape: &Shape) -> Color;
}

/// Exact geometric median of a region's pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExactMedian {
    /// Convergence threshold.
    pub epsilon: f64,
}

impl ColorEstimator for ExactMedian {
    fn estimate(&self, canvas: &Canvas, shape: &Shape) -> Color {
        geometric_median(&canvas.histogram(shape), self.epsilon)
            .unwrap_or_else(|| Color::from_rounded(canvas.mean(shape)))
    }
}

/// Quad-tree approximation, falling back to [`ExactMedian`] below
/// `min_area` pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadTreeMedian {
    tree: QuadTree,
    exact: ExactMedian,
    min_area: u64,
}

impl QuadTreeMedian {
    /// Build the tree for `canvas`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for an empty canvas.
    pub fn new(canvas: &Canvas, levels: u32, epsilon: f64, min_area: u64) -> Result<Self, GeometryError> {
        Ok(Self {
            tree: QuadTree::build(canvas, levels, epsilon)?,
            exact: ExactMedian { epsilon },
            min_area,
        })
    }
}

impl ColorEstimator for QuadTreeMedian {
    fn estimate(&self, canvas: &Canvas, shape: &Shape) -> Color {
        if shape.area() < self.min_area {
            return self.exact.estimate(canvas, shape);
        }
        self.tree
            .estimate(shape)
            .unwrap_or_else(|| self.exact.estimate(canvas, shape))
    }
}

/// A configured estimator, ready to run against one canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum Estimator {
    /// See [`ExactMedian`].
    Exact(ExactMedian),
    /// See [`QuadTreeMedian`].
    QuadTree(QuadTreeMedian),
}

impl Estimator {
    /// Instantiate the estimator selected by `config` for `canvas`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] when a quad-tree is requested
    /// for an empty canvas.
    pub fn from_config(canvas: &Canvas, config: &SolverConfig) -> Result<Self, GeometryError> {
        let exact = ExactMedian {
            epsilon: config.median_epsilon,
        };
        Ok(match config.estimator {
            EstimatorKind::Exact => Self::Exact(exact),
            EstimatorKind::QuadTree => Self::QuadTree(QuadTreeMedian::new(
                canvas,
                config.quad_tree_levels,
                config.median_epsilon,
                config.quad_tree_min_area,
            )?),
        })
    }
}

impl ColorEstimator for Estimator {
    fn estimate(&self, canvas: &Canvas, shape: &Shape) -> Color {
        match self {
            Self::Exact(e) => e.estimate(canvas, shape),
            Self::QuadTree(q) => q.estimate(canvas, shape),
        }
    }
}

/// Memoized color estimates for one canvas.
///
/// Borrowing the canvas ties the cache to it: a cache cannot outlive its
/// image or be handed a different one.
#[derive(Debug)]
pub struct ColorCache<'a> {
    canvas: &'a Canvas,
    estimator: Estimator,
    colors: HashMap<Shape, Color>,
    hits: u64,
}

impl<'a> ColorCache<'a> {
    /// An empty cache over `canvas`.
    #[must_use]
    pub fn new(canvas: &'a Canvas, estimator: Estimator) -> Self {
        Self {
            canvas,
            estimator,
            colors: HashMap::new(),
            hits: 0,
        }
    }

    /// The canvas being estimated.
    #[must_use]
    pub const fn canvas(&self) -> &'a Canvas {
        self.canvas
    }

    /// Robust color of `shape`, computed once per shape.
    pub fn color(&mut self, shape: &Shape) -> Color {
        if let Some(&color) = self.colors.get(shape) {
            self.hits += 1;
            return color;
        }
        let color = self.estimator.estimate(self.canvas, shape);
        self.colors.insert(*shape, color);
        color
    }

    /// Number of distinct shapes estimated so far.
    #[must_use]
    pub fn computed(&self) -> u64 {
        self.colors.len() as u64
    }

    /// Number of lookups answered from the cache.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn split_canvas() -> Canvas {
        Canvas::from_fn(
            Dimensions {
                width: 200,
                height: 200,
            },
            |x, _| if x < 100 { Color::BLACK } else { Color::WHITE },
        )
    }

    #[test]
    fn default_is_exact() {
        assert_eq!(EstimatorKind::default(), EstimatorKind::Exact);
    }

    #[test]
    fn exact_median_of_uniform_region() {
        let canvas = split_canvas();
        let e = ExactMedian { epsilon: 0.5 };
        assert_eq!(e.estimate(&canvas, &Shape::new(0, 0, 100, 200).unwrap()), Color::BLACK);
    }

    #[test]
    fn quad_tree_matches_exact_on_aligned_regions() {
        let canvas = split_canvas();
        let config = SolverConfig {
            estimator: EstimatorKind::QuadTree,
            quad_tree_min_area: 0,
            ..SolverConfig::default()
        };
        let estimator = Estimator::from_config(&canvas, &config).unwrap();
        assert!(matches!(estimator, Estimator::QuadTree(_)));
        let right = Shape::new(100, 0, 100, 200).unwrap();
        assert_eq!(estimator.estimate(&canvas, &right), Color::WHITE);
    }

    #[test]
    fn small_regions_use_exact_estimate() {
        let canvas = split_canvas();
        let q = QuadTreeMedian::new(&canvas, 1, 0.5, 10_000).unwrap();
        // A one-level tree only knows the canvas-wide median; the exact path
        // must be taken for this small, all-black region.
        let small = Shape::new(0, 0, 10, 10).unwrap();
        assert_eq!(q.estimate(&canvas, &small), Color::BLACK);
    }

    #[test]
    fn cache_counts_hits_and_misses() {
        let canvas = split_canvas();
        let mut cache = ColorCache::new(&canvas, Estimator::Exact(ExactMedian { epsilon: 0.5 }));
        let shape = Shape::new(0, 0, 50, 50).unwrap();
        assert_eq!(cache.color(&shape), Color::BLACK);
        assert_eq!(cache.color(&shape), Color::BLACK);
        assert_eq!(cache.computed(), 1);
        assert_eq!(cache.hits(), 1);
    }
}
