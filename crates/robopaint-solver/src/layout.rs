//! Initial block layouts and the plans that handle multi-block starts.
//!
//! Most canvases start as one white block `0`. Some start pre-cut into many
//! colored blocks, described by a JSON document:
//!
//! ```json
//! {"width": 400, "height": 400, "blocks": [
//!   {"blockId": "0", "bottomLeft": [0, 0], "topRight": [40, 40], "color": [255, 255, 255, 255]}
//! ]}
//! ```
//!
//! Two plans deal with such starts. The shuffle plan keeps the blocks and
//! fixes each one by swapping it with a better-colored block of equal size or
//! by recoloring it. The merge plan joins a grid of blocks back into one
//! canvas-sized block so the single-block strategies can run.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::canvas::Canvas;
use crate::cost::{CostModel, Operation};
use crate::estimator::ColorCache;
use crate::geometry::{GeometryError, Shape};
use crate::program::{BlockId, IdAllocator, Instruction};
use crate::types::{Color, Dimensions};

/// Channel bucket used to match swap partners by color.
pub const COLOR_BUCKET: u8 = 16;

/// How a multi-block initial layout is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutPlan {
    /// Keep the blocks; swap or recolor each one.
    Shuffle,
    /// Merge the grid into one block, then optimize that block.
    Merge,
    /// Try both and keep the cheaper.
    #[default]
    Best,
}

impl fmt::Display for LayoutPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shuffle => f.write_str("Shuffle"),
            Self::Merge => f.write_str("Merge"),
            Self::Best => f.write_str("Best"),
        }
    }
}

/// Problems with an initial layout.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The layout document is not valid JSON for the expected schema.
    #[error("invalid layout JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The layout was made for a canvas of another size.
    #[error("layout is {}x{} but the canvas is {}x{}", .layout.width, .layout.height, .canvas.width, .canvas.height)]
    CanvasMismatch {
        /// Size declared by the layout.
        layout: Dimensions,
        /// Size of the target canvas.
        canvas: Dimensions,
    },

    /// The layout has no blocks.
    #[error("layout has no blocks")]
    Empty,

    /// A block has degenerate corners.
    #[error("block {id}: {source}")]
    Geometry {
        /// Offending block.
        id: BlockId,
        /// Violated precondition.
        #[source]
        source: GeometryError,
    },

    /// A block extends past the canvas.
    #[error("block {id} at {shape} lies outside the canvas")]
    OutOfCanvas {
        /// Offending block.
        id: BlockId,
        /// Its shape.
        shape: Shape,
    },

    /// Two blocks overlap.
    #[error("blocks {a} and {b} overlap")]
    Overlap {
        /// First block.
        a: BlockId,
        /// Second block.
        b: BlockId,
    },

    /// Two blocks share an id.
    #[error("block id {0} is used twice")]
    DuplicateId(BlockId),

    /// The blocks leave part of the canvas uncovered.
    #[error("blocks cover {covered} of {total} pixels")]
    Gaps {
        /// Pixels covered.
        covered: u64,
        /// Canvas pixels.
        total: u64,
    },

    /// The blocks do not form a grid that column-wise merging can join.
    #[error("layout is not a mergeable grid: {0}")]
    NotGrid(GeometryError),
}

/// One block of a layout document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBlock {
    /// Block identifier.
    pub block_id: BlockId,
    /// `[x, y]` of the bottom-left corner.
    pub bottom_left: [u32; 2],
    /// `[x, y]` of the top-right corner (exclusive).
    pub top_right: [u32; 2],
    /// Initial paint.
    pub color: Color,
}

/// An initial layout document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialLayout {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Blocks covering the canvas.
    pub blocks: Vec<LayoutBlock>,
}

impl InitialLayout {
    /// The default start: one white block `0` covering the canvas.
    #[must_use]
    pub fn single(dimensions: Dimensions) -> Self {
        Self {
            width: dimensions.width,
            height: dimensions.height,
            blocks: vec![LayoutBlock {
                block_id: BlockId::new(0),
                bottom_left: [0, 0],
                top_right: [dimensions.width, dimensions.height],
                color: Color::WHITE,
            }],
        }
    }

    /// Parse a layout document.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Json`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Canvas size declared by the layout.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Check that the layout exactly tiles `canvas` and return its blocks.
    ///
    /// # Errors
    ///
    /// Returns the first [`LayoutError`] found.
    pub fn validate(&self, canvas: &Canvas) -> Result<Vec<Block>, LayoutError> {
        if self.dimensions() != canvas.dimensions() {
            return Err(LayoutError::CanvasMismatch {
                layout: self.dimensions(),
                canvas: canvas.dimensions(),
            });
        }
        if self.blocks.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut blocks: Vec<Block> = Vec::with_capacity(self.blocks.len());
        for b in &self.blocks {
            let [x1, y1] = b.bottom_left;
            let [x2, y2] = b.top_right;
            let shape = Shape::from_corners(x1, y1, x2, y2).map_err(|source| LayoutError::Geometry {
                id: b.block_id.clone(),
                source,
            })?;
            if canvas.check(&shape).is_err() {
                return Err(LayoutError::OutOfCanvas {
                    id: b.block_id.clone(),
                    shape,
                });
            }
            for other in &blocks {
                if other.id == b.block_id {
                    return Err(LayoutError::DuplicateId(b.block_id.clone()));
                }
                if other.shape.overlaps(&shape) {
                    return Err(LayoutError::Overlap {
                        a: other.id.clone(),
                        b: b.block_id.clone(),
                    });
                }
            }
            blocks.push(Block::new(b.block_id.clone(), shape, b.color));
        }

        let covered: u64 = blocks.iter().map(|b| b.shape.area()).sum();
        let total = canvas.dimensions().area();
        if covered != total {
            return Err(LayoutError::Gaps { covered, total });
        }
        Ok(blocks)
    }
}

/// Largest top-level id among `blocks`.
#[must_use]
pub fn max_root(blocks: &[Block]) -> u32 {
    blocks.iter().map(|b| b.id.root()).max().unwrap_or(0)
}

/// Swap-or-recolor plan for a multi-block start.
///
/// Blocks are visited last to first. A block is left alone if its paint is
/// already in the same color bucket as its robust color, or if it is so
/// close that not even a swap would pay. Otherwise the plan looks for an
/// unvisited block of the same size whose paint is in the bucket of the
/// wanted color and swaps when that lowers the score more than recoloring
/// would; failing that it recolors when recoloring lowers the score.
#[must_use]
pub fn shuffle(blocks: &[Block], colors: &mut ColorCache<'_>) -> Vec<Instruction> {
    let target = colors.canvas();
    let costs = CostModel::new(target.dimensions());

    let paint = |b: &Block| b.color.unwrap_or(Color::WHITE);
    let mut by_bucket: HashMap<Color, Vec<usize>> = HashMap::new();
    for (index, block) in blocks.iter().enumerate() {
        by_bucket.entry(paint(block).bucketed(COLOR_BUCKET)).or_default().push(index);
    }

    let mut fixed = vec![false; blocks.len()];
    let mut instructions = Vec::new();

    for index in (0..blocks.len()).rev() {
        if fixed[index] {
            continue;
        }
        let block = &blocks[index];
        let shape = &block.shape;
        let current = paint(block);
        let ideal = colors.color(shape);

        let old = target.similarity(shape, current);
        let ideal_similarity = target.similarity(shape, ideal);
        let area = shape.area();
        #[allow(clippy::cast_precision_loss)]
        let swap_cost = costs.cost(Operation::Swap, area) as f64;
        #[allow(clippy::cast_precision_loss)]
        let color_cost = costs.cost(Operation::Color, area) as f64;
        let recolor_delta = color_cost + ideal_similarity - old;

        if current.bucketed(COLOR_BUCKET) == ideal.bucketed(COLOR_BUCKET) || old < swap_cost {
            fixed[index] = true;
            continue;
        }

        let partner = by_bucket
            .get(&ideal.bucketed(COLOR_BUCKET))
            .into_iter()
            .flatten()
            .copied()
            .filter(|&other| other != index && !fixed[other])
            .filter(|&other| blocks[other].shape.same_size(shape))
            .find(|&other| {
                let o = &blocks[other];
                let o_paint = paint(o);
                let delta = swap_cost + (target.similarity(shape, o_paint) - old)
                    + (target.similarity(&o.shape, current) - target.similarity(&o.shape, o_paint));
                delta < 0.0 && delta < recolor_delta
            });

        if let Some(other) = partner {
            instructions.push(Instruction::Swap {
                a: block.id.clone(),
                b: blocks[other].id.clone(),
            });
            fixed[index] = true;
            fixed[other] = true;
        } else if recolor_delta < 0.0 {
            instructions.push(Instruction::Color {
                block: block.id.clone(),
                color: ideal,
            });
            fixed[index] = true;
        }
    }
    instructions
}

/// Merge a grid layout into one block: every column bottom-to-top, then the
/// columns left-to-right. Returns the instructions and the merged block.
///
/// # Errors
///
/// Returns [`LayoutError::Empty`] for no blocks and
/// [`LayoutError::NotGrid`] when two consecutive pieces cannot be merged.
pub fn merge_grid(blocks: &[Block], ids: &mut IdAllocator, costs: &CostModel) -> Result<(Vec<Instruction>, Block), LayoutError> {
    let mut sorted: Vec<&Block> = blocks.iter().collect();
    sorted.sort_by_key(|b| (b.shape.x(), b.shape.y()));

    let mut instructions = Vec::new();
    let mut columns: Vec<Block> = Vec::new();
    let mut current: Option<Block> = None;

    for block in sorted {
        current = Some(match current.take() {
            Some(column) if column.shape.x() == block.shape.x() => {
                let merged = column.merge(block, ids, costs).map_err(LayoutError::NotGrid)?;
                instructions.push(merged.instruction);
                merged.blocks
            }
            Some(column) => {
                columns.push(column);
                block.clone()
            }
            None => block.clone(),
        });
    }
    columns.extend(current);

    let mut columns = columns.into_iter();
    let mut merged = columns.next().ok_or(LayoutError::Empty)?;
    for column in columns {
        let next = merged.merge(&column, ids, costs).map_err(LayoutError::NotGrid)?;
        instructions.push(next.instruction);
        merged = next.blocks;
    }
    Ok((instructions, merged))
}
