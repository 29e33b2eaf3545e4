//! Operation pricing and the pixel-difference penalty.
//!
//! Both live on one numeric axis: an operation's cost is its base weight
//! scaled by how small the target block is relative to the canvas, and a
//! region's similarity penalty is its summed Euclidean RGBA distance to the
//! paint scaled by [`SIMILARITY_SCALE`].
//!
//! Operation costs are rounded to integers here, at the table boundary.
//! Similarity stays a real number until a final score is surfaced.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Color, Dimensions};

/// Scale factor that puts pixel distance on the same axis as operation cost.
pub const SIMILARITY_SCALE: f64 = 0.005;

/// The five operation kinds of the instruction language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Split a block in two along a vertical or horizontal line.
    LineCut,
    /// Split a block in four at a point.
    PointCut,
    /// Paint a block with one color.
    Color,
    /// Exchange two equal-size blocks.
    Swap,
    /// Join two adjacent blocks into a new one.
    Merge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineCut => f.write_str("line-cut"),
            Self::PointCut => f.write_str("point-cut"),
            Self::Color => f.write_str("color"),
            Self::Swap => f.write_str("swap"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

/// Base weights per operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTable {
    /// Line cut weight.
    pub line_cut: u32,
    /// Point cut weight.
    pub point_cut: u32,
    /// Color weight.
    pub color: u32,
    /// Swap weight.
    pub swap: u32,
    /// Merge weight.
    pub merge: u32,
}

impl CostTable {
    /// The weights used by the scoring service.
    pub const CONTEST: Self = Self {
        line_cut: 7,
        point_cut: 10,
        color: 5,
        swap: 3,
        merge: 1,
    };

    /// Base weight of an operation kind.
    #[must_use]
    pub const fn weight(&self, op: Operation) -> u32 {
        match op {
            Operation::LineCut => self.line_cut,
            Operation::PointCut => self.point_cut,
            Operation::Color => self.color,
            Operation::Swap => self.swap,
            Operation::Merge => self.merge,
        }
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self::CONTEST
    }
}

/// Prices operations for one canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModel {
    table: CostTable,
    canvas_area: u64,
}

impl CostModel {
    /// Contest pricing for a canvas of the given size.
    #[must_use]
    pub const fn new(dimensions: Dimensions) -> Self {
        Self::with_table(CostTable::CONTEST, dimensions)
    }

    /// Custom pricing for a canvas of the given size.
    #[must_use]
    pub const fn with_table(table: CostTable, dimensions: Dimensions) -> Self {
        Self {
            table,
            canvas_area: dimensions.area(),
        }
    }

    /// The weights in use.
    #[must_use]
    pub const fn table(&self) -> &CostTable {
        &self.table
    }

    /// `round(weight × canvas_area / area)`.
    ///
    /// `area` is the area of the block the operation applies to and must be
    /// positive.
    #[must_use]
    pub fn cost(&self, op: Operation, area: u64) -> u64 {
        debug_assert!(area > 0, "operation on a zero-area block");
        #[allow(clippy::cast_precision_loss)]
        let raw = f64::from(self.table.weight(op)) * self.canvas_area as f64 / area as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = raw.round() as u64;
        rounded
    }

    /// Cost of merging two blocks: the merge weight at the multiplier of the
    /// larger block.
    #[must_use]
    pub fn merge_cost(&self, area_a: u64, area_b: u64) -> u64 {
        self.cost(Operation::Merge, area_a.max(area_b))
    }
}

/// Similarity penalty of painting every pixel in `pixels` with `color`.
#[must_use]
pub fn similarity<I>(pixels: I, color: Color) -> f64
where
    I: IntoIterator<Item = Color>,
{
    let target = color.to_f64();
    pixels.into_iter().map(|p| p.distance_to(target)).sum::<f64>() * SIMILARITY_SCALE
}

/// Similarity penalty between two equally long pixel sequences.
#[must_use]
pub fn pairwise_similarity<I, J>(a: I, b: J) -> f64
where
    I: IntoIterator<Item = Color>,
    J: IntoIterator<Item = Color>,
{
    a.into_iter()
        .zip(b)
        .map(|(p, q)| p.distance(q))
        .sum::<f64>()
        * SIMILARITY_SCALE
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const CANVAS: Dimensions = Dimensions {
        width: 400,
        height: 400,
    };

    #[test]
    fn full_canvas_costs_equal_weights() {
        let model = CostModel::new(CANVAS);
        assert_eq!(model.cost(Operation::LineCut, 160_000), 7);
        assert_eq!(model.cost(Operation::PointCut, 160_000), 10);
        assert_eq!(model.cost(Operation::Color, 160_000), 5);
        assert_eq!(model.cost(Operation::Swap, 160_000), 3);
        assert_eq!(model.cost(Operation::Merge, 160_000), 1);
    }

    #[test]
    fn half_canvas_color_costs_double() {
        let model = CostModel::new(CANVAS);
        assert_eq!(model.cost(Operation::Color, 80_000), 10);
    }

    #[test]
    fn cost_rounds_to_nearest() {
        let model = CostModel::new(CANVAS);
        // 5 * 160000 / 120000 = 6.67
        assert_eq!(model.cost(Operation::Color, 120_000), 7);
        // 7 * 160000 / 150000 = 7.47
        assert_eq!(model.cost(Operation::LineCut, 150_000), 7);
    }

    #[test]
    fn merge_uses_larger_block() {
        let model = CostModel::new(CANVAS);
        assert_eq!(model.merge_cost(1600, 40_000), 4);
        assert_eq!(model.merge_cost(40_000, 1600), 4);
    }

    #[test]
    fn similarity_of_exact_match_is_zero() {
        let pixels = vec![Color::WHITE; 16];
        assert!(similarity(pixels, Color::WHITE).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_scales_distance() {
        let pixels = vec![Color::new(0, 0, 0, 0)];
        let s = similarity(pixels, Color::new(3, 4, 0, 0));
        assert!((s - 5.0 * SIMILARITY_SCALE).abs() < 1e-12);
    }

    #[test]
    fn pairwise_similarity_matches_uniform_case() {
        let a = vec![Color::BLACK; 10];
        let b = vec![Color::WHITE; 10];
        let s1 = pairwise_similarity(a.clone(), b);
        let s2 = similarity(a, Color::WHITE);
        assert!((s1 - s2).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn cost_is_non_increasing_in_area(a in 1u64..160_000, b in 1u64..160_000) {
            let model = CostModel::new(CANVAS);
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            for op in [
                Operation::LineCut,
                Operation::PointCut,
                Operation::Color,
                Operation::Swap,
                Operation::Merge,
            ] {
                prop_assert!(model.cost(op, small) >= model.cost(op, large));
            }
        }
    }
}
