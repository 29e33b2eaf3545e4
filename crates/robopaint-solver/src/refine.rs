//! Local search over the cut positions of a finished program.
//!
//! Every line cut is moved up to `radius` pixels along its axis and every
//! point cut anywhere in the `radius` square around it. A moved cut is kept
//! when the whole program, replayed from the initial layout, scores
//! strictly lower. Variants that break a later instruction (a swap of
//! blocks that no longer match in size, a cut that fell outside its block)
//! are skipped.
//!
//! Instructions are visited in order and each one sees the improvements
//! already kept for the ones before it.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::canvas::Canvas;
use crate::interpreter::{Interpreter, Replay, ReplayError};
use crate::program::Instruction;

/// Counters from one refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineStats {
    /// Variants replayed.
    pub tried: u64,
    /// Variants that lowered the score and were kept.
    pub accepted: u64,
    /// Variants whose program no longer replayed.
    pub invalid: u64,
}

/// A refined program together with its replay.
#[derive(Debug, Clone)]
pub struct Refined {
    /// The program, same length and order as the input.
    pub instructions: Vec<Instruction>,
    /// Replay of `instructions` from the initial layout.
    pub replay: Replay,
    /// Search counters.
    pub stats: RefineStats,
}

/// Whether an instruction has a position [`refine`] can move.
#[must_use]
pub const fn is_cut(instruction: &Instruction) -> bool {
    matches!(instruction, Instruction::LineCut { .. } | Instruction::PointCut { .. })
}

/// Nudge every cut of `instructions` by up to `radius` pixels, keeping
/// changes that lower the replayed score.
///
/// # Errors
///
/// Returns the [`ReplayError`] of `instructions` itself when it does not
/// replay from `initial`.
pub fn refine(
    target: &Canvas,
    initial: &[Block],
    instructions: &[Instruction],
    radius: u32,
) -> Result<Refined, ReplayError> {
    let mut best = instructions.to_vec();
    let mut best_score = Interpreter::run(target, initial, &best)?.score();
    let start_score = best_score;
    let mut stats = RefineStats::default();
    let mut prefix = Interpreter::new(target, initial)?;

    for index in 0..best.len() {
        for variant in nudges(&best[index], radius) {
            stats.tried += 1;
            let Ok(score) = score_with(&prefix, &variant, &best[index + 1..]) else {
                stats.invalid += 1;
                continue;
            };
            if score < best_score {
                tracing::debug!(index, from = best_score, to = score, "cut moved");
                best[index] = variant;
                best_score = score;
                stats.accepted += 1;
            }
        }
        prefix.apply(&best[index])?;
    }

    tracing::debug!(
        from = start_score,
        to = best_score,
        tried = stats.tried,
        accepted = stats.accepted,
        "refined"
    );
    Ok(Refined {
        instructions: best,
        replay: prefix.finish(),
        stats,
    })
}

/// Score of `prefix` followed by `variant` and `rest`.
fn score_with(prefix: &Interpreter<'_>, variant: &Instruction, rest: &[Instruction]) -> Result<u64, ReplayError> {
    let mut trial = prefix.clone();
    trial.apply(variant)?;
    for instruction in rest {
        trial.apply(instruction)?;
    }
    Ok(trial.finish().score())
}

fn shifted(value: u32, delta: i64) -> Option<u32> {
    u32::try_from(i64::from(value) + delta).ok()
}

/// Moved copies of a cut in increasing offset order. Empty for anything
/// else.
fn nudges(instruction: &Instruction, radius: u32) -> Vec<Instruction> {
    let r = i64::from(radius);
    match instruction {
        Instruction::LineCut { block, axis, at } => (-r..=r)
            .filter(|&d| d != 0)
            .filter_map(|d| shifted(*at, d))
            .map(|at| Instruction::LineCut {
                block: block.clone(),
                axis: *axis,
                at,
            })
            .collect(),
        Instruction::PointCut { block, x, y } => (-r..=r)
            .flat_map(|dx| (-r..=r).map(move |dy| (dx, dy)))
            .filter(|&offset| offset != (0, 0))
            .filter_map(|(dx, dy)| Some((shifted(*x, dx)?, shifted(*y, dy)?)))
            .map(|(x, y)| Instruction::PointCut {
                block: block.clone(),
                x,
                y,
            })
            .collect(),
        Instruction::Color { .. } | Instruction::Merge { .. } | Instruction::Swap { .. } => Vec::new(),
    }
}
