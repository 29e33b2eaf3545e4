//! Precomputed quad-tree of geometric medians.
//!
//! Each node stores the geometric median of its own region. A query for an
//! arbitrary rectangle collects the smallest set of nodes that covers it (up
//! to a zoom limit) and combines their representative colors with a
//! weighted geometric median, weighting each node by how much of it lies
//! inside the query. This trades exactness for not rescanning every pixel of
//! large regions.

use crate::canvas::Canvas;
use crate::geometry::{GeometryError, Shape};
use crate::median::{WeightedPoint, geometric_median, weighted_geometric_median};
use crate::types::Color;

/// One node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadTreeNode {
    depth: u32,
    shape: Shape,
    color: Color,
    children: Vec<Self>,
}

impl QuadTreeNode {
    /// Depth of the node, 0 for the root.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Region covered by the node.
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Geometric median of the node's pixels.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Child nodes in point-cut order (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    fn build(canvas: &Canvas, shape: Shape, depth: u32, levels: u32, epsilon: f64) -> Self {
        let color = geometric_median(&canvas.histogram(&shape), epsilon)
            .unwrap_or_else(|| Color::from_rounded(canvas.mean(&shape)));
        let children = if depth + 1 < levels && shape.width() >= 2 && shape.height() >= 2 {
            let mx = shape.x() + shape.width().div_ceil(2);
            let my = shape.y() + shape.height().div_ceil(2);
            shape
                .split_xy(mx, my)
                .map(|parts| {
                    parts
                        .into_iter()
                        .map(|child| Self::build(canvas, child, depth + 1, levels, epsilon))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Self {
            depth,
            shape,
            color,
            children,
        }
    }

    fn cover<'a>(&'a self, query: &Shape, zoom: u32, out: &mut Vec<&'a Self>) {
        if !self.shape.overlaps(query) {
            return;
        }
        if query.contains(&self.shape) || self.children.is_empty() || self.depth >= zoom {
            out.push(self);
            return;
        }
        for child in &self.children {
            child.cover(query, zoom, out);
        }
    }
}

/// A read-only quad-tree built once per canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadTree {
    root: QuadTreeNode,
    levels: u32,
    epsilon: f64,
}

impl QuadTree {
    /// Build a tree with `levels` levels (root included) over the whole
    /// canvas.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for an empty canvas.
    pub fn build(canvas: &Canvas, levels: u32, epsilon: f64) -> Result<Self, GeometryError> {
        let bounds = canvas.bounds()?;
        let levels = levels.max(1);
        Ok(Self {
            root: QuadTreeNode::build(canvas, bounds, 0, levels, epsilon),
            levels,
            epsilon,
        })
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> &QuadTreeNode {
        &self.root
    }

    /// Number of levels, root included.
    #[must_use]
    pub const fn levels(&self) -> u32 {
        self.levels
    }

    /// Minimal set of nodes covering `query`, descending no deeper than
    /// `zoom`. Nodes that only partly overlap the query are included whole.
    #[must_use]
    pub fn cover(&self, query: &Shape, zoom: u32) -> Vec<&QuadTreeNode> {
        let mut out = Vec::new();
        self.root.cover(query, zoom, &mut out);
        out
    }

    /// Approximate geometric median of `query` from the covering nodes at
    /// full depth.
    #[must_use]
    pub fn estimate(&self, query: &Shape) -> Option<Color> {
        let points: Vec<WeightedPoint> = self
            .cover(query, self.levels - 1)
            .into_iter()
            .filter_map(|node| {
                let overlap = node.shape.intersection(query)?;
                #[allow(clippy::cast_precision_loss)]
                let weight = overlap.area() as f64;
                Some((node.color.to_f64(), weight))
            })
            .collect();
        weighted_geometric_median(&points, self.epsilon).map(Color::from_rounded)
    }
}
