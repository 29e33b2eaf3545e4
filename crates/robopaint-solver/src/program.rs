//! Block identifiers, bound instructions and relocatable programs.
//!
//! The block optimizer reuses one sub-program for every block with the same
//! shape and paint, wherever that block sits in the cut tree. A [`Program`]
//! therefore addresses its targets by a *relative path* from the block it
//! was computed for; [`Program::bind`] turns it into absolute
//! [`Instruction`]s once the real block id is known.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cost::Operation;
use crate::geometry::Axis;
use crate::types::Color;

/// A block identifier: a top-level number followed by the child indices
/// of every cut on the way down, written `3.0.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockId {
    root: u32,
    path: Vec<u8>,
}

impl BlockId {
    /// A top-level block.
    #[must_use]
    pub const fn new(root: u32) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    /// The `index`-th child produced by cutting this block.
    #[must_use]
    pub fn child(&self, index: u8) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            root: self.root,
            path,
        }
    }

    /// The descendant reached by following `relative` child indices.
    #[must_use]
    pub fn join(&self, relative: &[u8]) -> Self {
        let mut path = self.path.clone();
        path.extend_from_slice(relative);
        Self {
            root: self.root,
            path,
        }
    }

    /// Top-level number.
    #[must_use]
    pub const fn root(&self) -> u32 {
        self.root
    }

    /// Child indices below the top-level block.
    #[must_use]
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// The same path under a different top-level number.
    #[must_use]
    pub fn with_root(&self, root: u32) -> Self {
        Self {
            root,
            path: self.path.clone(),
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for index in &self.path {
            write!(f, ".{index}")?;
        }
        Ok(())
    }
}

/// A string that is not a valid block identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block id {0:?}")]
pub struct ParseBlockIdError(pub String);

impl FromStr for BlockId {
    type Err = ParseBlockIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseBlockIdError(s.to_string());
        let mut parts = s.split('.');
        let root = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let path = parts
            .map(|p| p.parse::<u8>().ok().filter(|i| *i < 4))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(invalid)?;
        Ok(Self { root, path })
    }
}

impl TryFrom<String> for BlockId {
    type Error = ParseBlockIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.to_string()
    }
}

/// One operation addressed by absolute block id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// `color [id] [r, g, b, a]`
    Color {
        /// Target block.
        block: BlockId,
        /// New paint.
        color: Color,
    },
    /// `cut [id] [x|y] [v]`
    LineCut {
        /// Target block.
        block: BlockId,
        /// Cut orientation.
        axis: Axis,
        /// Absolute cut coordinate.
        at: u32,
    },
    /// `cut [id] [x, y]`
    PointCut {
        /// Target block.
        block: BlockId,
        /// Absolute x of the cut point.
        x: u32,
        /// Absolute y of the cut point.
        y: u32,
    },
    /// `merge [a] [b]`
    Merge {
        /// First block.
        a: BlockId,
        /// Second block.
        b: BlockId,
    },
    /// `swap [a] [b]`
    Swap {
        /// First block.
        a: BlockId,
        /// Second block.
        b: BlockId,
    },
}

impl Instruction {
    /// The priced operation kind.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Color { .. } => Operation::Color,
            Self::LineCut { .. } => Operation::LineCut,
            Self::PointCut { .. } => Operation::PointCut,
            Self::Merge { .. } => Operation::Merge,
            Self::Swap { .. } => Operation::Swap,
        }
    }

    /// Rewrite every block id the instruction references, stopping at the
    /// first id `f` rejects.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn try_map_ids<F, E>(self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(BlockId) -> Result<BlockId, E>,
    {
        Ok(match self {
            Self::Color { block, color } => Self::Color {
                block: f(block)?,
                color,
            },
            Self::LineCut { block, axis, at } => Self::LineCut {
                block: f(block)?,
                axis,
                at,
            },
            Self::PointCut { block, x, y } => Self::PointCut {
                block: f(block)?,
                x,
                y,
            },
            Self::Merge { a, b } => Self::Merge { a: f(a)?, b: f(b)? },
            Self::Swap { a, b } => Self::Swap { a: f(a)?, b: f(b)? },
        })
    }
}

/// The action of a relative [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Repaint the target.
    Color(Color),
    /// Cut the target in two.
    LineCut {
        /// Cut orientation.
        axis: Axis,
        /// Absolute cut coordinate.
        at: u32,
    },
    /// Cut the target in four.
    PointCut {
        /// Absolute x.
        x: u32,
        /// Absolute y.
        y: u32,
    },
}

/// An action on the block reached by `target` from the program's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Child indices from the block the program was computed for.
    pub target: Vec<u8>,
    /// What to do there.
    pub action: Action,
}

/// A relocatable operation sequence with its accumulated score.
///
/// `cost` is the sum of the rounded operation costs; `similarity` is the
/// unexplained pixel difference left after running the steps. Both are kept
/// apart so that similarity is only rounded when a final score is reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    steps: Vec<Step>,
    cost: u64,
    similarity: f64,
}

impl Program {
    /// The do-nothing program leaving `similarity` unexplained.
    #[must_use]
    pub const fn noop(similarity: f64) -> Self {
        Self {
            steps: Vec::new(),
            cost: 0,
            similarity,
        }
    }

    /// A program starting with one action on its origin block.
    #[must_use]
    pub fn start(action: Action, cost: u64) -> Self {
        Self {
            steps: vec![Step {
                target: Vec::new(),
                action,
            }],
            cost,
            similarity: 0.0,
        }
    }

    /// Append `other`, which was computed for the same origin block.
    pub fn append(&mut self, other: &Self) {
        self.steps.extend(other.steps.iter().cloned());
        self.cost += other.cost;
        self.similarity += other.similarity;
    }

    /// Append `other`, which was computed for child `index` of the origin.
    pub fn append_child(&mut self, index: u8, other: &Self) {
        self.steps.extend(other.steps.iter().map(|step| {
            let mut target = Vec::with_capacity(step.target.len() + 1);
            target.push(index);
            target.extend_from_slice(&step.target);
            Step {
                target,
                action: step.action,
            }
        }));
        self.cost += other.cost;
        self.similarity += other.similarity;
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the program does nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Summed operation cost.
    #[must_use]
    pub const fn cost(&self) -> u64 {
        self.cost
    }

    /// Remaining pixel difference.
    #[must_use]
    pub const fn similarity(&self) -> f64 {
        self.similarity
    }

    /// `cost + similarity` at full precision, used for comparisons.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> f64 {
        self.cost as f64 + self.similarity
    }

    /// Resolve relative targets against the block the program runs on.
    #[must_use]
    pub fn bind(&self, origin: &BlockId) -> Vec<Instruction> {
        self.steps
            .iter()
            .map(|step| {
                let block = origin.join(&step.target);
                match step.action {
                    Action::Color(color) => Instruction::Color { block, color },
                    Action::LineCut { axis, at } => Instruction::LineCut { block, axis, at },
                    Action::PointCut { x, y } => Instruction::PointCut { block, x, y },
                }
            })
            .collect()
    }
}

/// Hands out top-level ids for merged blocks.
///
/// Owned by one solve; never global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Start allocating after the largest existing top-level id.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn after(max_existing: u32) -> Self {
        Self {
            next: max_existing as u64 + 1,
        }
    }

    /// The id the next merge will produce. Past `u32::MAX` nothing is
    /// left to allocate.
    #[must_use]
    pub const fn peek(&self) -> u64 {
        self.next
    }

    /// Take the next id, or `None` once the `u32` range is used up.
    pub fn allocate(&mut self) -> Option<BlockId> {
        let root = u32::try_from(self.next).ok()?;
        self.next += 1;
        Some(BlockId::new(root))
    }
}

/// A renumbered id would not fit a top-level number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("block {id} cannot move from start {old_start} to {new_start}: top-level id overflows")]
pub struct RebaseError {
    /// The id that could not be shifted.
    pub id: BlockId,
    /// Requested old start.
    pub old_start: u32,
    /// Requested new start.
    pub new_start: u32,
}

/// Shift every id whose top-level number is at least `old_start` so that
/// `old_start` becomes `new_start`.
///
/// # Errors
///
/// Returns [`RebaseError`] when a shifted id exceeds `u32::MAX`.
pub fn rebase(instructions: &[Instruction], old_start: u32, new_start: u32) -> Result<Vec<Instruction>, RebaseError> {
    let shift = |id: BlockId| -> Result<BlockId, RebaseError> {
        if id.root() < old_start {
            return Ok(id);
        }
        match (id.root() - old_start).checked_add(new_start) {
            Some(root) => Ok(id.with_root(root)),
            None => Err(RebaseError {
                id,
                old_start,
                new_start,
            }),
        }
    };
    instructions
        .iter()
        .cloned()
        .map(|instruction| instruction.try_map_ids(shift))
        .collect()
}

/// Run `body`, written for a canvas whose working block is `old_start`,
/// after an externally supplied `prefix` that leaves the working block at
/// `new_start`.
///
/// # Errors
///
/// See [`rebase`].
pub fn splice(
    prefix: &[Instruction],
    body: &[Instruction],
    old_start: u32,
    new_start: u32,
) -> Result<Vec<Instruction>, RebaseError> {
    let mut out = prefix.to_vec();
    out.extend(rebase(body, old_start, new_start)?);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn block_id_display_and_parse() {
        let id = BlockId::new(3).child(0).child(2);
        assert_eq!(id.to_string(), "3.0.2");
        assert_eq!("3.0.2".parse::<BlockId>().unwrap(), id);
        assert_eq!("17".parse::<BlockId>().unwrap(), BlockId::new(17));
    }

    #[test]
    fn block_id_rejects_garbage() {
        for bad in ["", "a", "1.", "1.4", "1..0", "-1", "1.0.x"] {
            assert!(bad.parse::<BlockId>().is_err(), "{bad:?} parsed");
        }
    }

    #[test]
    fn block_id_serializes_as_string() {
        let id = BlockId::new(0).child(1);
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""0.1""#);
        let back: BlockId = serde_json::from_str(r#""0.1""#).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn bind_resolves_relative_targets() {
        let mut program = Program::start(
            Action::LineCut {
                axis: Axis::X,
                at: 200,
            },
            7,
        );
        program.append_child(0, &Program::start(Action::Color(Color::BLACK), 10));

        let bound = program.bind(&BlockId::new(0).child(3));
        assert_eq!(
            bound,
            vec![
                Instruction::LineCut {
                    block: "0.3".parse().unwrap(),
                    axis: Axis::X,
                    at: 200,
                },
                Instruction::Color {
                    block: "0.3.0".parse().unwrap(),
                    color: Color::BLACK,
                },
            ]
        );
    }

    #[test]
    fn append_accumulates_cost_and_similarity() {
        let mut program = Program::start(Action::Color(Color::WHITE), 5);
        program.append(&Program::noop(2.5));
        assert_eq!(program.cost(), 5);
        assert!((program.score() - 7.5).abs() < 1e-12);
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn allocator_counts_up_from_max() {
        let mut ids = IdAllocator::after(99);
        assert_eq!(ids.peek(), 100);
        assert_eq!(ids.allocate(), Some(BlockId::new(100)));
        assert_eq!(ids.allocate(), Some(BlockId::new(101)));
    }

    #[test]
    fn allocator_runs_out_at_u32_max() {
        let mut ids = IdAllocator::after(u32::MAX - 1);
        assert_eq!(ids.allocate(), Some(BlockId::new(u32::MAX)));
        assert_eq!(ids.allocate(), None);
        assert_eq!(IdAllocator::after(u32::MAX).allocate(), None);
    }

    #[test]
    fn rebase_reports_overflow() {
        let body = vec![Instruction::Color {
            block: "7.2".parse().unwrap(),
            color: Color::BLACK,
        }];
        let err = rebase(&body, 0, u32::MAX - 3).unwrap_err();
        assert_eq!(err.id, "7.2".parse().unwrap());
        assert!(splice(&[], &body, 0, u32::MAX - 3).is_err());
        assert!(rebase(&body, 0, u32::MAX - 7).is_ok());
    }

    #[test]
    fn rebase_shifts_ids_at_or_above_start() {
        let body = vec![
            Instruction::Color {
                block: "0.1".parse().unwrap(),
                color: Color::BLACK,
            },
            Instruction::Merge {
                a: BlockId::new(1),
                b: BlockId::new(2),
            },
        ];
        let shifted = rebase(&body, 0, 399).unwrap();
        assert_eq!(
            shifted[0],
            Instruction::Color {
                block: "399.1".parse().unwrap(),
                color: Color::BLACK,
            }
        );
        assert_eq!(
            shifted[1],
            Instruction::Merge {
                a: BlockId::new(400),
                b: BlockId::new(401),
            }
        );
    }

    #[test]
    fn rebase_keeps_ids_below_start() {
        let body = vec![Instruction::Swap {
            a: BlockId::new(2),
            b: BlockId::new(10),
        }];
        let shifted = rebase(&body, 5, 20).unwrap();
        assert_eq!(
            shifted[0],
            Instruction::Swap {
                a: BlockId::new(2),
                b: BlockId::new(25),
            }
        );
    }

    #[test]
    fn splice_keeps_prefix_verbatim() {
        let prefix = vec![Instruction::Merge {
            a: BlockId::new(0),
            b: BlockId::new(1),
        }];
        let body = vec![Instruction::Color {
            block: BlockId::new(0),
            color: Color::WHITE,
        }];
        let out = splice(&prefix, &body, 0, 2).unwrap();
        assert_eq!(out[0], prefix[0]);
        assert_eq!(
            out[1],
            Instruction::Color {
                block: BlockId::new(2),
                color: Color::WHITE,
            }
        );
    }
}
