//! Shared types for the robopaint solver.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::estimator::EstimatorKind;
use crate::geometry::{GeometryError, Shape};
use crate::interpreter::ReplayError;
use crate::layout::{LayoutError, LayoutPlan};
use crate::pixel_grid::Direction;

/// Re-export `RgbaImage` so downstream crates can build and inspect
/// canvases without depending on `image` directly.
pub use image::RgbaImage;

/// An RGBA paint color, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// Opaque white, the paint of a fresh canvas.
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// Opaque black.
    pub const BLACK: Self = Self([0, 0, 0, 255]);

    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Channels as floating-point coordinates of a 4-D point.
    #[must_use]
    pub fn to_f64(self) -> [f64; 4] {
        self.0.map(f64::from)
    }

    /// Round a 4-D point to the nearest color, clamping each channel to
    /// `0..=255`.
    #[must_use]
    pub fn from_rounded(point: [f64; 4]) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(point.map(|v| v.round().clamp(0.0, 255.0) as u8))
    }

    /// Euclidean RGBA distance to another color.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_to(other.to_f64())
    }

    /// Euclidean RGBA distance to an arbitrary 4-D point.
    #[must_use]
    pub fn distance_to(self, point: [f64; 4]) -> f64 {
        self.0
            .iter()
            .zip(point)
            .map(|(&c, p)| {
                let d = f64::from(c) - p;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Floor every channel to a multiple of `bucket`.
    ///
    /// Two colors in the same bucket are treated as interchangeable when
    /// looking for swap partners.
    #[must_use]
    pub fn bucketed(self, bucket: u8) -> Self {
        let bucket = bucket.max(1);
        Self(self.0.map(|c| c / bucket * bucket))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "[{r}, {g}, {b}, {a}]")
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(pixel: image::Rgba<u8>) -> Self {
        Self(pixel.0)
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(color: Color) -> Self {
        Self(color.0)
    }
}

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Which program synthesis strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Recursive block optimizer (split / recolor / leave).
    Blocks,
    /// Greedy scanline recoloring over a sweep of cell sizes and directions.
    PixelGrid,
    /// Horizontal band dynamic programming.
    Stripes,
    /// Run every applicable strategy and keep the cheapest result.
    #[default]
    Best,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks => f.write_str("Blocks"),
            Self::PixelGrid => f.write_str("PixelGrid"),
            Self::Stripes => f.write_str("Stripes"),
            Self::Best => f.write_str("Best"),
        }
    }
}

/// Configuration for a solve.
///
/// Every solve owns its own caches; nothing in the configuration is shared
/// between canvases. The compute budget is bounded up front through
/// `max_depth`, the grid sweep and the stripe step, since the search has no
/// cancellation points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Which strategy (or all of them) to run.
    pub strategy: StrategyKind,

    /// Maximum recursion depth of the block optimizer. At depth zero only
    /// recoloring is possible.
    pub max_depth: u32,

    /// Convergence threshold of the geometric median iteration, in color
    /// units.
    pub median_epsilon: f64,

    /// Color estimation strategy used by the block optimizer.
    pub estimator: EstimatorKind,

    /// Number of levels of the geometric-median quad-tree (root included).
    pub quad_tree_levels: u32,

    /// Regions with fewer pixels than this are always estimated exactly,
    /// even when the quad-tree estimator is selected.
    pub quad_tree_min_area: u64,

    /// Cell sizes tried by the pixel-grid optimizer.
    pub grid_cell_sizes: Vec<u32>,

    /// Scan directions tried by the pixel-grid optimizer.
    pub grid_directions: Vec<Direction>,

    /// Band granularity of the stripe optimizer, in pixels.
    pub stripe_step: u32,

    /// How multi-block initial layouts are handled.
    pub layout_plan: LayoutPlan,

    /// How far the winning program's cuts are nudged afterwards, in
    /// pixels. Zero skips refinement.
    pub refine_radius: u32,

    /// Winning programs with more cuts than this are left as they are.
    pub refine_max_cuts: usize,
}

impl SolverConfig {
    /// Default block optimizer depth.
    pub const DEFAULT_MAX_DEPTH: u32 = 5;
    /// Default geometric median convergence threshold.
    pub const DEFAULT_MEDIAN_EPSILON: f64 = 0.5;
    /// Default quad-tree depth.
    pub const DEFAULT_QUAD_TREE_LEVELS: u32 = 6;
    /// Default minimum region area for quad-tree estimates.
    pub const DEFAULT_QUAD_TREE_MIN_AREA: u64 = 10_000;
    /// Default pixel-grid cell sizes.
    pub const DEFAULT_GRID_CELL_SIZES: [u32; 4] = [10, 20, 25, 40];
    /// Default stripe granularity.
    pub const DEFAULT_STRIPE_STEP: u32 = 10;
    /// Default cut nudge radius.
    pub const DEFAULT_REFINE_RADIUS: u32 = 4;
    /// Default cut limit for refinement.
    pub const DEFAULT_REFINE_MAX_CUTS: usize = 200;

    /// Check the configuration for values the solvers cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::InvalidConfig`] describing the first problem
    /// found.
    pub fn validate(&self) -> Result<(), SolveError> {
        if !(self.median_epsilon.is_finite() && self.median_epsilon > 0.0) {
            return Err(SolveError::InvalidConfig(format!(
                "median_epsilon must be positive and finite, got {}",
                self.median_epsilon
            )));
        }
        if self.quad_tree_levels == 0 {
            return Err(SolveError::InvalidConfig(
                "quad_tree_levels must be at least 1".to_string(),
            ));
        }
        if self.grid_cell_sizes.contains(&0) {
            return Err(SolveError::InvalidConfig(
                "grid_cell_sizes must not contain 0".to_string(),
            ));
        }
        if self.stripe_step == 0 {
            return Err(SolveError::InvalidConfig(
                "stripe_step must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
            median_epsilon: Self::DEFAULT_MEDIAN_EPSILON,
            estimator: EstimatorKind::default(),
            quad_tree_levels: Self::DEFAULT_QUAD_TREE_LEVELS,
            quad_tree_min_area: Self::DEFAULT_QUAD_TREE_MIN_AREA,
            grid_cell_sizes: Self::DEFAULT_GRID_CELL_SIZES.to_vec(),
            grid_directions: Direction::ALL.to_vec(),
            stripe_step: Self::DEFAULT_STRIPE_STEP,
            layout_plan: LayoutPlan::default(),
            refine_radius: Self::DEFAULT_REFINE_RADIUS,
            refine_max_cuts: Self::DEFAULT_REFINE_MAX_CUTS,
        }
    }
}

/// Errors that can occur while preparing or running a solve.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Solver configuration is invalid.
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// A shape handed to the solver does not fit on the canvas.
    #[error("{shape} lies outside the {}x{} canvas", .dimensions.width, .dimensions.height)]
    OutOfCanvas {
        /// The offending shape.
        shape: Shape,
        /// Canvas dimensions.
        dimensions: Dimensions,
    },

    /// A geometry precondition was violated.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// The initial layout is unusable.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// A synthesized program failed to replay.
    #[error(transparent)]
    Replay(#[from] ReplayError),
}
