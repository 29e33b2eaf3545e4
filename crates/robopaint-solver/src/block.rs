//! Addressable canvas blocks and the five operations on them.
//!
//! Every operation checks its geometric precondition, then returns the
//! blocks it produces together with the emitted [`Instruction`] and its
//! cost. Input blocks are never modified; callers drop the consumed ones.

use crate::cost::{CostModel, Operation};
use crate::geometry::{Axis, GeometryError, Shape};
use crate::program::{BlockId, IdAllocator, Instruction};
use crate::types::Color;

/// A block of the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Identifier used by instructions.
    pub id: BlockId,
    /// Covered region.
    pub shape: Shape,
    /// Uniform paint of the block, `None` once differently painted blocks
    /// have been merged into it.
    pub color: Option<Color>,
}

/// The result of applying one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    /// Blocks produced by the operation.
    pub blocks: T,
    /// The instruction that performs it.
    pub instruction: Instruction,
    /// Its rounded cost.
    pub cost: u64,
}

impl Block {
    /// A uniformly painted block.
    #[must_use]
    pub const fn new(id: BlockId, shape: Shape, color: Color) -> Self {
        Self {
            id,
            shape,
            color: Some(color),
        }
    }

    fn children<const N: usize>(&self, shapes: [Shape; N]) -> [Self; N] {
        let mut index = 0u8;
        shapes.map(|shape| {
            let child = Self {
                id: self.id.child(index),
                shape,
                color: self.color,
            };
            index += 1;
            child
        })
    }

    /// Paint the whole block with `color`.
    #[must_use]
    pub fn recolor(&self, color: Color, costs: &CostModel) -> Applied<Self> {
        Applied {
            blocks: Self {
                color: Some(color),
                ..self.clone()
            },
            instruction: Instruction::Color {
                block: self.id.clone(),
                color,
            },
            cost: costs.cost(Operation::Color, self.shape.area()),
        }
    }

    /// Cut along `axis` at absolute coordinate `at`. Children are
    /// `[left, right]` or `[bottom, top]`, ids `.0` and `.1`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SplitOutOfRange`] unless `at` is strictly
    /// inside the block.
    pub fn line_cut(&self, axis: Axis, at: u32, costs: &CostModel) -> Result<Applied<[Self; 2]>, GeometryError> {
        let shapes = self.shape.split(axis, at)?;
        Ok(Applied {
            blocks: self.children(shapes),
            instruction: Instruction::LineCut {
                block: self.id.clone(),
                axis,
                at,
            },
            cost: costs.cost(Operation::LineCut, self.shape.area()),
        })
    }

    /// Vertical cut at absolute `x`.
    ///
    /// # Errors
    ///
    /// See [`line_cut`](Self::line_cut).
    pub fn line_cut_x(&self, x: u32, costs: &CostModel) -> Result<Applied<[Self; 2]>, GeometryError> {
        self.line_cut(Axis::X, x, costs)
    }

    /// Horizontal cut at absolute `y`.
    ///
    /// # Errors
    ///
    /// See [`line_cut`](Self::line_cut).
    pub fn line_cut_y(&self, y: u32, costs: &CostModel) -> Result<Applied<[Self; 2]>, GeometryError> {
        self.line_cut(Axis::Y, y, costs)
    }

    /// Cut into four at `(x, y)`. Children are bottom-left, bottom-right,
    /// top-right, top-left, ids `.0` to `.3`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SplitOutOfRange`] unless the point is
    /// strictly inside the block.
    pub fn point_cut(&self, x: u32, y: u32, costs: &CostModel) -> Result<Applied<[Self; 4]>, GeometryError> {
        let shapes = self.shape.split_xy(x, y)?;
        Ok(Applied {
            blocks: self.children(shapes),
            instruction: Instruction::PointCut {
                block: self.id.clone(),
                x,
                y,
            },
            cost: costs.cost(Operation::PointCut, self.shape.area()),
        })
    }

    /// Join with an edge-adjacent block into a new block with the next
    /// top-level id.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NotAdjacent`] unless the blocks share a full
    /// edge of equal length, [`GeometryError::IdsExhausted`] when no id is
    /// left for the result.
    pub fn merge(&self, other: &Self, ids: &mut IdAllocator, costs: &CostModel) -> Result<Applied<Self>, GeometryError> {
        let shape = self.shape.union_adjacent(&other.shape)?;
        let color = match (self.color, other.color) {
            (Some(a), Some(b)) if a == b => Some(a),
            _ => None,
        };
        let id = ids.allocate().ok_or(GeometryError::IdsExhausted)?;
        Ok(Applied {
            blocks: Self {
                id,
                shape,
                color,
            },
            instruction: Instruction::Merge {
                a: self.id.clone(),
                b: other.id.clone(),
            },
            cost: costs.merge_cost(self.shape.area(), other.shape.area()),
        })
    }

    /// Exchange identities (and paint) with an equal-size block. The first
    /// returned block keeps `self`'s id and paint at `other`'s position.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SelfSwap`] when both operands are the same
    /// block and [`GeometryError::SizeMismatch`] unless both blocks have the
    /// same width and height.
    pub fn swap(&self, other: &Self, costs: &CostModel) -> Result<Applied<[Self; 2]>, GeometryError> {
        if self.id == other.id {
            return Err(GeometryError::SelfSwap { shape: self.shape });
        }
        if !self.shape.same_size(&other.shape) {
            return Err(GeometryError::SizeMismatch {
                a: self.shape,
                b: other.shape,
            });
        }
        Ok(Applied {
            blocks: [
                Self {
                    shape: other.shape,
                    ..self.clone()
                },
                Self {
                    shape: self.shape,
                    ..other.clone()
                },
            ],
            instruction: Instruction::Swap {
                a: self.id.clone(),
                b: other.id.clone(),
            },
            cost: costs.cost(Operation::Swap, self.shape.area()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    const CANVAS: Dimensions = Dimensions {
        width: 400,
        height: 400,
    };

    fn block(id: u32, x: u32, y: u32, w: u32, h: u32) -> Block {
        Block::new(BlockId::new(id), Shape::new(x, y, w, h).unwrap(), Color::WHITE)
    }

    #[test]
    fn line_cut_names_children() {
        let costs = CostModel::new(CANVAS);
        let cut = block(0, 0, 0, 400, 400).line_cut_x(100, &costs).unwrap();
        let [left, right] = &cut.blocks;
        assert_eq!(left.id.to_string(), "0.0");
        assert_eq!(right.id.to_string(), "0.1");
        assert_eq!(left.shape.width(), 100);
        assert_eq!(right.shape.x(), 100);
        assert_eq!(left.color, Some(Color::WHITE));
        assert_eq!(cut.cost, 7);
    }

    #[test]
    fn point_cut_costs_and_order() {
        let costs = CostModel::new(CANVAS);
        let cut = block(0, 0, 0, 200, 200).point_cut(100, 100, &costs).unwrap();
        assert_eq!(cut.cost, 40);
        assert_eq!(cut.blocks[2].id.to_string(), "0.2");
        assert_eq!(cut.blocks[2].shape, Shape::new(100, 100, 100, 100).unwrap());
    }

    #[test]
    fn cut_outside_block_fails() {
        let costs = CostModel::new(CANVAS);
        assert!(block(0, 0, 0, 400, 400).line_cut_y(400, &costs).is_err());
    }

    #[test]
    fn merge_allocates_next_id() {
        let costs = CostModel::new(CANVAS);
        let mut ids = IdAllocator::after(1);
        let merged = block(0, 0, 0, 200, 400)
            .merge(&block(1, 200, 0, 200, 400), &mut ids, &costs)
            .unwrap();
        assert_eq!(merged.blocks.id, BlockId::new(2));
        assert_eq!(merged.blocks.shape, Shape::new(0, 0, 400, 400).unwrap());
        assert_eq!(merged.cost, 2);
        assert_eq!(merged.blocks.color, Some(Color::WHITE));
    }

    #[test]
    fn merge_of_differently_painted_blocks_is_not_uniform() {
        let costs = CostModel::new(CANVAS);
        let mut ids = IdAllocator::after(1);
        let black = Block::new(BlockId::new(1), Shape::new(0, 10, 10, 10).unwrap(), Color::BLACK);
        let merged = block(0, 0, 0, 10, 10).merge(&black, &mut ids, &costs).unwrap();
        assert_eq!(merged.blocks.color, None);
    }

    #[test]
    fn merge_of_unequal_blocks_fails() {
        let costs = CostModel::new(CANVAS);
        let mut ids = IdAllocator::after(1);
        let result = block(0, 0, 0, 10, 20).merge(&block(1, 10, 0, 30, 15), &mut ids, &costs);
        assert!(matches!(result, Err(GeometryError::NotAdjacent { .. })));
        assert_eq!(ids.peek(), 2);
    }

    #[test]
    fn swap_exchanges_positions() {
        let costs = CostModel::new(CANVAS);
        let a = block(0, 0, 0, 200, 200);
        let b = Block::new(BlockId::new(1), Shape::new(200, 0, 200, 200).unwrap(), Color::BLACK);
        let swapped = a.swap(&b, &costs).unwrap();
        assert_eq!(swapped.blocks[0].id, a.id);
        assert_eq!(swapped.blocks[0].shape, b.shape);
        assert_eq!(swapped.blocks[1].color, Some(Color::BLACK));
        assert_eq!(swapped.blocks[1].shape, a.shape);
        assert_eq!(swapped.cost, 12);
    }

    #[test]
    fn swap_of_different_sizes_fails() {
        let costs = CostModel::new(CANVAS);
        let result = block(0, 0, 0, 10, 10).swap(&block(1, 10, 0, 20, 10), &costs);
        assert!(matches!(result, Err(GeometryError::SizeMismatch { .. })));
    }

    #[test]
    fn swap_with_itself_fails() {
        let costs = CostModel::new(CANVAS);
        let a = block(0, 0, 0, 10, 10);
        assert!(matches!(a.swap(&a, &costs), Err(GeometryError::SelfSwap { .. })));
    }

    #[test]
    fn merge_without_free_ids_fails() {
        let costs = CostModel::new(CANVAS);
        let mut ids = IdAllocator::after(u32::MAX);
        let result = block(0, 0, 0, 200, 400).merge(&block(1, 200, 0, 200, 400), &mut ids, &costs);
        assert_eq!(result.unwrap_err(), GeometryError::IdsExhausted);
    }
}
