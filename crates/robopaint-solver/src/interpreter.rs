//! Replays instruction lists on a painted raster.
//!
//! Every strategy's output goes through here before it is returned, so the
//! score reported to the caller is the score of what was actually emitted:
//! ids must exist when referenced, cuts must be interior, merges adjacent,
//! swaps between two distinct blocks of one size.

use std::collections::HashMap;

use crate::block::{Applied, Block};
use crate::canvas::Canvas;
use crate::cost::CostModel;
use crate::geometry::GeometryError;
use crate::program::{BlockId, IdAllocator, Instruction};
use crate::types::Color;

/// Why an instruction list could not be replayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// An instruction references a block that does not exist (never
    /// created, or consumed by an earlier cut or merge).
    #[error("instruction {index}: unknown block {id}")]
    UnknownBlock {
        /// Zero-based instruction index.
        index: usize,
        /// The missing id.
        id: BlockId,
    },

    /// An instruction violates a geometry precondition.
    #[error("instruction {index}: {source}")]
    Geometry {
        /// Zero-based instruction index.
        index: usize,
        /// The violated precondition.
        #[source]
        source: GeometryError,
    },

    /// Two initial blocks share an id.
    #[error("initial block {0} appears twice")]
    DuplicateBlock(BlockId),
}

/// The outcome of replaying a program.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    /// Summed operation cost.
    pub cost: u64,
    /// Pixel difference between the painted result and the target.
    pub similarity: f64,
    /// The painted result.
    pub painted: Canvas,
}

impl Replay {
    /// The contest score: cost plus rounded similarity.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn score(&self) -> u64 {
        self.cost + self.similarity.round() as u64
    }
}

/// Replay state: the live blocks and the painted raster.
#[derive(Debug, Clone)]
pub struct Interpreter<'a> {
    target: &'a Canvas,
    costs: CostModel,
    blocks: HashMap<BlockId, Block>,
    painted: Canvas,
    ids: IdAllocator,
    cost: u64,
    applied: usize,
}

impl<'a> Interpreter<'a> {
    /// Start from `initial` blocks painted on a canvas the size of `target`.
    ///
    /// Non-uniform initial blocks (`color == None`) are painted white.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::DuplicateBlock`] when two initial blocks
    /// share an id.
    pub fn new(target: &'a Canvas, initial: &[Block]) -> Result<Self, ReplayError> {
        let mut painted = Canvas::filled(target.dimensions(), Color::WHITE);
        let mut blocks = HashMap::with_capacity(initial.len());
        let mut max_root = 0;
        for block in initial {
            painted.fill(&block.shape, block.color.unwrap_or(Color::WHITE));
            max_root = max_root.max(block.id.root());
            if blocks.insert(block.id.clone(), block.clone()).is_some() {
                return Err(ReplayError::DuplicateBlock(block.id.clone()));
            }
        }
        Ok(Self {
            target,
            costs: CostModel::new(target.dimensions()),
            blocks,
            painted,
            ids: IdAllocator::after(max_root),
            cost: 0,
            applied: 0,
        })
    }

    /// Replay `instructions` from `initial` and score the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`ReplayError`] encountered.
    pub fn run(target: &'a Canvas, initial: &[Block], instructions: &[Instruction]) -> Result<Replay, ReplayError> {
        let mut interpreter = Self::new(target, initial)?;
        for instruction in instructions {
            interpreter.apply(instruction)?;
        }
        Ok(interpreter.finish())
    }

    /// A live block.
    #[must_use]
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Operation cost accumulated so far.
    #[must_use]
    pub const fn cost(&self) -> u64 {
        self.cost
    }

    /// The painted raster so far.
    #[must_use]
    pub const fn painted(&self) -> &Canvas {
        &self.painted
    }

    /// Allocator positioned after every id created so far.
    #[must_use]
    pub const fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    fn take(&mut self, id: &BlockId) -> Result<Block, ReplayError> {
        self.blocks.remove(id).ok_or_else(|| ReplayError::UnknownBlock {
            index: self.applied,
            id: id.clone(),
        })
    }

    fn get(&self, id: &BlockId) -> Result<&Block, ReplayError> {
        self.blocks.get(id).ok_or_else(|| ReplayError::UnknownBlock {
            index: self.applied,
            id: id.clone(),
        })
    }

    const fn geometry(&self, source: GeometryError) -> ReplayError {
        ReplayError::Geometry {
            index: self.applied,
            source,
        }
    }

    fn insert_all<I: IntoIterator<Item = Block>>(&mut self, blocks: I) {
        for block in blocks {
            self.blocks.insert(block.id.clone(), block);
        }
    }

    /// Apply one instruction and return its cost.
    ///
    /// On error the state is left unchanged.
    ///
    /// # Errors
    ///
    /// [`ReplayError::UnknownBlock`] for a missing id,
    /// [`ReplayError::Geometry`] for a violated precondition.
    pub fn apply(&mut self, instruction: &Instruction) -> Result<u64, ReplayError> {
        let cost = match instruction {
            Instruction::Color { block, color } => {
                let applied = self.get(block)?.recolor(*color, &self.costs);
                self.painted.fill(&applied.blocks.shape, *color);
                self.insert_all([applied.blocks]);
                applied.cost
            }
            Instruction::LineCut { block, axis, at } => {
                let applied = self
                    .get(block)?
                    .line_cut(*axis, *at, &self.costs)
                    .map_err(|e| self.geometry(e))?;
                self.blocks.remove(block);
                self.insert_all(applied.blocks);
                applied.cost
            }
            Instruction::PointCut { block, x, y } => {
                let applied = self
                    .get(block)?
                    .point_cut(*x, *y, &self.costs)
                    .map_err(|e| self.geometry(e))?;
                self.blocks.remove(block);
                self.insert_all(applied.blocks);
                applied.cost
            }
            Instruction::Merge { a, b } => {
                let first = self.get(a)?;
                let second = self.get(b)?;
                let mut ids = self.ids.clone();
                let Applied { blocks, cost, .. } = first
                    .merge(second, &mut ids, &self.costs)
                    .map_err(|e| self.geometry(e))?;
                self.ids = ids;
                self.take(a)?;
                self.take(b)?;
                self.insert_all([blocks]);
                cost
            }
            Instruction::Swap { a, b } => {
                let first = self.get(a)?;
                let second = self.get(b)?;
                let Applied { blocks, cost, .. } = first.swap(second, &self.costs).map_err(|e| self.geometry(e))?;
                self.painted
                    .swap_regions(&blocks[0].shape, &blocks[1].shape)
                    .map_err(|e| self.geometry(e))?;
                self.insert_all(blocks);
                cost
            }
        };
        self.cost += cost;
        self.applied += 1;
        Ok(cost)
    }

    /// Score the painted raster against the target.
    #[must_use]
    pub fn finish(self) -> Replay {
        let similarity = self
            .target
            .bounds()
            .map_or(0.0, |bounds| self.painted.similarity_to(self.target, &bounds));
        Replay {
            cost: self.cost,
            similarity,
            painted: self.painted,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{Axis, Shape};
    use crate::types::Dimensions;

    fn half_black(size: u32) -> Canvas {
        Canvas::from_fn(
            Dimensions {
                width: size,
                height: size,
            },
            |x, _| if x < size / 2 { Color::BLACK } else { Color::WHITE },
        )
    }

    fn root(canvas: &Canvas) -> Vec<Block> {
        vec![Block::new(BlockId::new(0), canvas.bounds().unwrap(), Color::WHITE)]
    }

    fn id(s: &str) -> BlockId {
        s.parse().unwrap()
    }

    #[test]
    fn empty_program_scores_similarity_only() {
        let target = half_black(400);
        let replay = Interpreter::run(&target, &root(&target), &[]).unwrap();
        assert_eq!(replay.cost, 0);
        let expected = target.similarity(&Shape::new(0, 0, 200, 400).unwrap(), Color::WHITE);
        assert!((replay.similarity - expected).abs() < 1e-6);
    }

    #[test]
    fn cut_and_color_reproduces_target() {
        let target = half_black(400);
        let program = [
            Instruction::LineCut {
                block: id("0"),
                axis: Axis::X,
                at: 200,
            },
            Instruction::Color {
                block: id("0.0"),
                color: Color::BLACK,
            },
        ];
        let replay = Interpreter::run(&target, &root(&target), &program).unwrap();
        assert_eq!(replay.cost, 7 + 10);
        assert!(replay.similarity.abs() < 1e-9);
        assert_eq!(replay.score(), 17);
        assert_eq!(replay.painted, target);
    }

    #[test]
    fn cut_consumes_parent() {
        let target = half_black(10);
        let program = [
            Instruction::LineCut {
                block: id("0"),
                axis: Axis::Y,
                at: 5,
            },
            Instruction::Color {
                block: id("0"),
                color: Color::BLACK,
            },
        ];
        let err = Interpreter::run(&target, &root(&target), &program).unwrap_err();
        assert_eq!(err, ReplayError::UnknownBlock { index: 1, id: id("0") });
    }

    #[test]
    fn merge_creates_next_id() {
        let target = half_black(10);
        let program = [
            Instruction::LineCut {
                block: id("0"),
                axis: Axis::X,
                at: 5,
            },
            Instruction::Merge {
                a: id("0.0"),
                b: id("0.1"),
            },
            Instruction::Color {
                block: id("1"),
                color: Color::BLACK,
            },
        ];
        let replay = Interpreter::run(&target, &root(&target), &program).unwrap();
        // 7 for the cut, 1 at the half-canvas multiplier 2 for the merge,
        // 5 for the full-canvas color.
        assert_eq!(replay.cost, 7 + 2 + 5);
    }

    #[test]
    fn swap_exchanges_painted_regions() {
        let target = half_black(10);
        let program = [
            Instruction::LineCut {
                block: id("0"),
                axis: Axis::X,
                at: 5,
            },
            Instruction::Color {
                block: id("0.1"),
                color: Color::BLACK,
            },
            Instruction::Swap {
                a: id("0.0"),
                b: id("0.1"),
            },
        ];
        let mut interpreter = Interpreter::new(&target, &root(&target)).unwrap();
        for instruction in &program {
            interpreter.apply(instruction).unwrap();
        }
        assert_eq!(interpreter.painted().pixel(0, 0), Color::BLACK);
        assert_eq!(interpreter.painted().pixel(9, 9), Color::WHITE);
        assert_eq!(interpreter.block(&id("0.1")).unwrap().shape.x(), 0);
        assert_eq!(interpreter.len(), 2);
    }

    #[test]
    fn swapping_a_block_with_itself_is_rejected() {
        let target = half_black(10);
        let mut interpreter = Interpreter::new(&target, &root(&target)).unwrap();
        let err = interpreter
            .apply(&Instruction::Swap { a: id("0"), b: id("0") })
            .unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Geometry {
                index: 0,
                source: GeometryError::SelfSwap { .. }
            }
        ));
        assert_eq!(interpreter.cost(), 0);
        assert_eq!(interpreter.len(), 1);
    }

    #[test]
    fn failed_merge_leaves_state_unchanged() {
        let target = half_black(10);
        let mut interpreter = Interpreter::new(&target, &root(&target)).unwrap();
        interpreter
            .apply(&Instruction::PointCut {
                block: id("0"),
                x: 5,
                y: 5,
            })
            .unwrap();
        let err = interpreter
            .apply(&Instruction::Merge {
                a: id("0.0"),
                b: id("0.2"),
            })
            .unwrap_err();
        assert!(matches!(err, ReplayError::Geometry { index: 1, .. }));
        assert_eq!(interpreter.len(), 4);
        assert_eq!(interpreter.cost(), 10);
    }

    #[test]
    fn duplicate_initial_blocks_are_rejected() {
        let target = half_black(10);
        let mut initial = root(&target);
        initial.push(initial[0].clone());
        assert!(matches!(
            Interpreter::new(&target, &initial),
            Err(ReplayError::DuplicateBlock(_))
        ));
    }
}
