//! Greedy scanline recoloring on a fixed cell grid.
//!
//! Starting from one corner of a block, the optimizer walks the first row
//! and first column of cells. Whenever a cell would look better painted
//! with its own robust color, everything beyond that cell is cut off,
//! painted, and merged back, so later cells still address one live block.
//! Then the block is point-cut one cell in from the corner and the walk
//! continues on the diagonally opposite child. Cells painted by later steps
//! simply overwrite earlier paint.
//!
//! There is no backtracking. After each row/column pass the running cost and
//! similarity are recorded, and the cheapest prefix of the run is kept.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::{Applied, Block};
use crate::canvas::Canvas;
use crate::cost::{CostModel, Operation};
use crate::estimator::{ColorCache, Estimator, ExactMedian};
use crate::geometry::{Axis, GeometryError, Shape};
use crate::program::{IdAllocator, Instruction};
use crate::types::{Color, SolveError};

/// Scan direction, named by where the walk heads from its start corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Start bottom-left, move right and up.
    UpRight,
    /// Start bottom-right, move left and up.
    UpLeft,
    /// Start top-right, move left and down.
    DownLeft,
    /// Start top-left, move right and down.
    DownRight,
}

impl Direction {
    /// All four directions.
    pub const ALL: [Self; 4] = [Self::UpRight, Self::UpLeft, Self::DownLeft, Self::DownRight];

    /// Whether the walk moves toward larger `x`.
    #[must_use]
    pub const fn rightward(self) -> bool {
        matches!(self, Self::UpRight | Self::DownRight)
    }

    /// Whether the walk moves toward larger `y`.
    #[must_use]
    pub const fn upward(self) -> bool {
        matches!(self, Self::UpRight | Self::UpLeft)
    }

    /// Index of the point-cut child the walk continues into.
    const fn continuation(self) -> usize {
        match self {
            Self::DownLeft => 0,
            Self::DownRight => 1,
            Self::UpRight => 2,
            Self::UpLeft => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpRight => f.write_str("up-right"),
            Self::UpLeft => f.write_str("up-left"),
            Self::DownLeft => f.write_str("down-left"),
            Self::DownRight => f.write_str("down-right"),
        }
    }
}

/// The kept prefix of one grid walk.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRun {
    /// Cell edge length.
    pub cell_size: u32,
    /// Scan direction.
    pub direction: Direction,
    /// Instructions of the kept prefix.
    pub instructions: Vec<Instruction>,
    /// Summed operation cost of the prefix.
    pub cost: u64,
    /// Similarity inside the start block after the prefix.
    pub similarity: f64,
}

impl GridRun {
    /// `cost + similarity`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> f64 {
        self.cost as f64 + self.similarity
    }
}

/// The sub-rectangle of `shape` at offset `(along_x, along_y)` cells from
/// the start corner, clipped to the shape.
fn cell(shape: &Shape, direction: Direction, along_x: u32, along_y: u32, size: u32) -> Result<Shape, GeometryError> {
    let w = size.min(shape.width() - along_x);
    let h = size.min(shape.height() - along_y);
    let x = if direction.rightward() {
        shape.x() + along_x
    } else {
        shape.x2() - along_x - w
    };
    let y = if direction.upward() {
        shape.y() + along_y
    } else {
        shape.y2() - along_y - h
    };
    Shape::new(x, y, w, h)
}

/// State of one walk.
struct Walk<'c> {
    target: &'c Canvas,
    painted: Canvas,
    ids: IdAllocator,
    block: Block,
    instructions: Vec<Instruction>,
    cost: u64,
    /// Similarity of regions the walk has left behind.
    frozen: f64,
}

impl Walk<'_> {
    fn push(&mut self, instruction: Instruction, cost: u64) {
        self.instructions.push(instruction);
        self.cost += cost;
    }

    fn similarity(&self) -> f64 {
        self.frozen + self.painted.similarity_to(self.target, &self.block.shape)
    }

    /// Cut the live block at `at`, paint the far side, merge back.
    fn paint_beyond(&mut self, axis: Axis, at: u32, far_is_high: bool, color: Color, costs: &CostModel) -> Result<(), GeometryError> {
        let Applied {
            blocks: [low, high],
            instruction,
            cost,
        } = self.block.line_cut(axis, at, costs)?;
        self.push(instruction, cost);

        let (low, high) = if far_is_high {
            let painted = high.recolor(color, costs);
            self.painted.fill(&high.shape, color);
            self.push(painted.instruction, painted.cost);
            (low, painted.blocks)
        } else {
            let painted = low.recolor(color, costs);
            self.painted.fill(&low.shape, color);
            self.push(painted.instruction, painted.cost);
            (painted.blocks, high)
        };

        let merged = low.merge(&high, &mut self.ids, costs)?;
        self.push(merged.instruction, merged.cost);
        self.block = merged.blocks;
        Ok(())
    }
}

/// Grid walks over one canvas, sharing a cell color cache.
#[derive(Debug)]
pub struct PixelGrid<'a> {
    colors: ColorCache<'a>,
    costs: CostModel,
}

impl<'a> PixelGrid<'a> {
    /// Walks estimating cell colors with an exact geometric median.
    #[must_use]
    pub fn new(canvas: &'a Canvas, epsilon: f64) -> Self {
        Self {
            colors: ColorCache::new(canvas, Estimator::Exact(ExactMedian { epsilon })),
            costs: CostModel::new(canvas.dimensions()),
        }
    }

    /// Number of distinct cells whose color was estimated.
    #[must_use]
    pub fn colors_estimated(&self) -> u64 {
        self.colors.computed()
    }

    /// The cell's robust color if painting `area` pixels with it pays off
    /// within the cell.
    fn pick(&mut self, painted: &Canvas, cell: &Shape, area: u64) -> Option<Color> {
        let target = self.colors.canvas();
        let color = self.colors.color(cell);
        let old = painted.similarity_to(target, cell);
        let new = target.similarity(cell, color);
        #[allow(clippy::cast_precision_loss)]
        let color_cost = self.costs.cost(Operation::Color, area) as f64;
        (old > new + color_cost).then_some(color)
    }

    /// Walk the grid from `start`, a live block on `painted`, allocating
    /// merge ids after `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::OutOfCanvas`] if `start` is off the canvas and
    /// [`SolveError::InvalidConfig`] for a zero cell size.
    pub fn run(
        &mut self,
        start: &Block,
        painted: &Canvas,
        ids: &IdAllocator,
        cell_size: u32,
        direction: Direction,
    ) -> Result<GridRun, SolveError> {
        let target = self.colors.canvas();
        target.check(&start.shape)?;
        if cell_size == 0 {
            return Err(SolveError::InvalidConfig("grid cell size must be at least 1".to_string()));
        }

        let mut walk = Walk {
            target,
            painted: painted.clone(),
            ids: ids.clone(),
            block: start.clone(),
            instructions: Vec::new(),
            cost: 0,
            frozen: 0.0,
        };
        let mut best = (0, 0, walk.similarity());
        #[allow(clippy::cast_precision_loss)]
        let total = |cost: u64, similarity: f64| cost as f64 + similarity;

        loop {
            let shape = walk.block.shape;
            let (w, h) = (shape.width(), shape.height());

            let corner = cell(&shape, direction, 0, 0, cell_size)?;
            if let Some(color) = self.pick(&walk.painted, &corner, shape.area()) {
                let applied = walk.block.recolor(color, &self.costs);
                walk.painted.fill(&shape, color);
                walk.push(applied.instruction, applied.cost);
                walk.block = applied.blocks;
            }

            let mut along = cell_size;
            while along < w {
                let c = cell(&shape, direction, along, 0, cell_size)?;
                if let Some(color) = self.pick(&walk.painted, &c, u64::from(w - along) * u64::from(h)) {
                    let at = if direction.rightward() { shape.x() + along } else { shape.x2() - along };
                    walk.paint_beyond(Axis::X, at, direction.rightward(), color, &self.costs)?;
                }
                along += cell_size;
            }

            let mut along = cell_size;
            while along < h {
                let c = cell(&shape, direction, 0, along, cell_size)?;
                if let Some(color) = self.pick(&walk.painted, &c, u64::from(w) * u64::from(h - along)) {
                    let at = if direction.upward() { shape.y() + along } else { shape.y2() - along };
                    walk.paint_beyond(Axis::Y, at, direction.upward(), color, &self.costs)?;
                }
                along += cell_size;
            }

            let similarity = walk.similarity();
            if total(walk.cost, similarity) < total(best.1, best.2) {
                best = (walk.instructions.len(), walk.cost, similarity);
            }

            if w <= cell_size || h <= cell_size {
                break;
            }
            let x = if direction.rightward() { shape.x() + cell_size } else { shape.x2() - cell_size };
            let y = if direction.upward() { shape.y() + cell_size } else { shape.y2() - cell_size };
            let cut = walk.block.point_cut(x, y, &self.costs)?;
            walk.push(cut.instruction, cut.cost);
            let keep = direction.continuation();
            for (index, child) in cut.blocks.iter().enumerate() {
                if index != keep {
                    walk.frozen += walk.painted.similarity_to(target, &child.shape);
                }
            }
            walk.block = cut.blocks[keep].clone();
        }

        let (len, cost, similarity) = best;
        walk.instructions.truncate(len);
        tracing::debug!(cell_size, %direction, cost, similarity, ops = len, "grid walk");
        Ok(GridRun {
            cell_size,
            direction,
            instructions: walk.instructions,
            cost,
            similarity,
        })
    }

    /// Run every combination of `cell_sizes` and `directions` and keep the
    /// cheapest walk. Returns `None` when either list is empty.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn sweep(
        &mut self,
        start: &Block,
        painted: &Canvas,
        ids: &IdAllocator,
        cell_sizes: &[u32],
        directions: &[Direction],
    ) -> Result<Option<GridRun>, SolveError> {
        let mut best: Option<GridRun> = None;
        for &cell_size in cell_sizes {
            for &direction in directions {
                let run = self.run(start, painted, ids, cell_size, direction)?;
                if best.as_ref().is_none_or(|b| run.score() < b.score()) {
                    best = Some(run);
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::program::BlockId;
    use crate::types::Dimensions;

    fn square(size: u32) -> Dimensions {
        Dimensions {
            width: size,
            height: size,
        }
    }

    fn root(canvas: &Canvas) -> Block {
        Block::new(BlockId::new(0), canvas.bounds().unwrap(), Color::WHITE)
    }

    fn checker(size: u32, cell: u32) -> Canvas {
        Canvas::from_fn(square(size), |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Color::new(200, 20, 20, 255)
            } else {
                Color::new(20, 20, 200, 255)
            }
        })
    }

    #[test]
    fn direction_flags() {
        assert!(Direction::UpRight.rightward() && Direction::UpRight.upward());
        assert!(!Direction::DownLeft.rightward() && !Direction::DownLeft.upward());
        assert_eq!(Direction::ALL.len(), 4);
        assert_eq!(Direction::UpLeft.to_string(), "up-left");
    }

    #[test]
    fn cell_from_each_corner() {
        let shape = Shape::new(0, 0, 25, 25).unwrap();
        assert_eq!(cell(&shape, Direction::UpRight, 0, 0, 10).unwrap(), Shape::new(0, 0, 10, 10).unwrap());
        assert_eq!(cell(&shape, Direction::DownLeft, 0, 0, 10).unwrap(), Shape::new(15, 15, 10, 10).unwrap());
        // Last cell is clipped to the shape.
        assert_eq!(cell(&shape, Direction::UpLeft, 20, 0, 10).unwrap(), Shape::new(0, 0, 5, 10).unwrap());
    }

    #[test]
    fn white_canvas_needs_nothing() {
        let canvas = Canvas::filled(square(40), Color::WHITE);
        let mut grid = PixelGrid::new(&canvas, 0.5);
        let run = grid
            .run(&root(&canvas), &canvas, &IdAllocator::after(0), 10, Direction::UpRight)
            .unwrap();
        assert!(run.instructions.is_empty());
        assert!(run.similarity.abs() < f64::EPSILON);
    }

    #[test]
    fn every_direction_replays_to_the_reported_score() {
        let target = checker(100, 20);
        let white = Canvas::filled(target.dimensions(), Color::WHITE);
        let start = root(&target);
        let mut grid = PixelGrid::new(&target, 0.5);
        for direction in Direction::ALL {
            let run = grid.run(&start, &white, &IdAllocator::after(0), 20, direction).unwrap();
            assert!(!run.instructions.is_empty(), "{direction} found nothing to paint");
            let replay = Interpreter::run(&target, &[start.clone()], &run.instructions).unwrap();
            assert_eq!(replay.cost, run.cost, "{direction}");
            assert!((replay.similarity - run.similarity).abs() < 1e-6, "{direction}");
        }
    }

    #[test]
    fn aligned_grid_beats_doing_nothing() {
        let target = checker(100, 20);
        let white = Canvas::filled(target.dimensions(), Color::WHITE);
        let start = root(&target);
        let baseline = white.similarity_to(&target, &start.shape);
        let mut grid = PixelGrid::new(&target, 0.5);
        let best = grid
            .sweep(&start, &white, &IdAllocator::after(0), &[10, 20], &Direction::ALL)
            .unwrap()
            .unwrap();
        assert!(best.score() < baseline);
    }

    #[test]
    fn empty_sweep_yields_nothing() {
        let canvas = Canvas::filled(square(10), Color::WHITE);
        let mut grid = PixelGrid::new(&canvas, 0.5);
        let result = grid
            .sweep(&root(&canvas), &canvas, &IdAllocator::after(0), &[], &Direction::ALL)
            .unwrap();
        assert!(result.is_none());
    }
}
