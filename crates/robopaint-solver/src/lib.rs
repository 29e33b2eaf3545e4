//! robopaint-solver: block-painting program search (sans-IO).
//!
//! Given a target raster, finds a cheap sequence of canvas instructions
//! (cut, recolor, merge, swap) whose rendering approximates it, scored as
//! operation cost plus pixel difference.
//!
//! This crate has **no I/O dependencies**: it works on in-memory pixels and
//! returns typed instructions. Text serialization lives in
//! `robopaint-export`, file handling in `robopaint-bench`.
//!
//! # Strategies
//!
//! - [`BlockOptimizer`]: depth-bounded recursive search over leave, recolor
//!   and split candidates, memoized by value.
//! - [`PixelGrid`]: greedy scanline recoloring over a sweep of cell sizes
//!   and directions.
//! - [`stripes`](stripes::stripes): horizontal band dynamic programming.
//!
//! The winning program's cuts are then nudged a few pixels each way by
//! [`refine`](refine::refine), keeping moves that lower the score.
//!
//! Multi-block initial layouts are either shuffled in place or merged into
//! one block first, see [`layout`].

pub mod block;
pub mod canvas;
pub mod cost;
pub mod diagnostics;
pub mod estimator;
pub mod geometry;
pub mod interpreter;
pub mod layout;
pub mod median;
pub mod optimizer;
pub mod pixel_grid;
pub mod program;
pub mod quad_tree;
pub mod refine;
pub mod stripes;
pub mod types;

use std::time::Duration;

pub use block::Block;
pub use canvas::Canvas;
pub use cost::{CostModel, Operation};
pub use diagnostics::{Clock, NullClock, SolveDiagnostics, StrategyDiagnostics};
pub use estimator::{ColorEstimator, Estimator, EstimatorKind};
pub use geometry::{Axis, GeometryError, Shape};
pub use interpreter::{Interpreter, Replay, ReplayError};
pub use layout::{InitialLayout, LayoutError, LayoutPlan};
pub use optimizer::{BlockOptimizer, OptimizerStats};
pub use pixel_grid::{Direction, PixelGrid};
pub use program::{BlockId, IdAllocator, Instruction, Program, RebaseError, rebase, splice};
pub use refine::{RefineStats, Refined, refine};
pub use types::{Color, Dimensions, SolveError, SolverConfig, StrategyKind};

/// The chosen program for a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Instructions, addressed from the initial layout.
    pub instructions: Vec<Instruction>,
    /// Replayed operation cost.
    pub cost: u64,
    /// Replayed similarity.
    pub similarity: f64,
    /// Label of the candidate that produced the program.
    pub strategy: String,
}

impl Solution {
    /// The contest score: cost plus rounded similarity.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn score(&self) -> u64 {
        self.cost + self.similarity.round() as u64
    }
}

/// A program produced by one strategy, before scoring.
struct Candidate {
    name: String,
    instructions: Vec<Instruction>,
    duration: Duration,
}

/// Where the single-block strategies start: the live block after `prefix`.
struct Base {
    label: &'static str,
    prefix: Vec<Instruction>,
    block: Block,
}

/// Find the cheapest program for `canvas` starting from `layout`.
///
/// # Errors
///
/// Returns [`SolveError::InvalidConfig`] for a bad configuration,
/// [`SolveError::Layout`] when the layout does not fit the canvas and
/// [`SolveError::Replay`] if a strategy emitted an inconsistent program.
pub fn solve(canvas: &Canvas, layout: &InitialLayout, config: &SolverConfig) -> Result<Solution, SolveError> {
    solve_with_diagnostics(canvas, layout, config, &NullClock).map(|(solution, _)| solution)
}

/// [`solve`], also returning per-strategy diagnostics timed with `clock`.
///
/// Every candidate, including the empty program, is replayed from the
/// initial layout and scored; the lowest score wins, earlier candidates
/// winning ties.
///
/// # Errors
///
/// See [`solve`].
#[allow(clippy::too_many_lines)]
pub fn solve_with_diagnostics<C: Clock>(
    canvas: &Canvas,
    layout: &InitialLayout,
    config: &SolverConfig,
    clock: &C,
) -> Result<(Solution, SolveDiagnostics), SolveError> {
    config.validate()?;
    let started = clock.now();
    let dimensions = canvas.dimensions();
    let _span = tracing::info_span!("solve", width = dimensions.width, height = dimensions.height).entered();

    let initial = layout.validate(canvas)?;
    let costs = CostModel::new(dimensions);
    let mut candidates = vec![Candidate {
        name: "Noop".to_string(),
        instructions: Vec::new(),
        duration: Duration::ZERO,
    }];
    let mut optimizer_stats = None;

    let base = match initial.as_slice() {
        [only] => Some(Base {
            label: "",
            prefix: Vec::new(),
            block: only.clone(),
        }),
        _ => {
            let plan = config.layout_plan;
            if matches!(plan, LayoutPlan::Shuffle | LayoutPlan::Best) {
                let _span = tracing::info_span!("strategy", name = "Shuffle").entered();
                let t = clock.now();
                let mut colors = estimator::ColorCache::new(canvas, Estimator::from_config(canvas, config)?);
                let instructions = layout::shuffle(&initial, &mut colors);
                candidates.push(Candidate {
                    name: "Shuffle".to_string(),
                    instructions,
                    duration: clock.elapsed(&t),
                });
            }
            if matches!(plan, LayoutPlan::Merge | LayoutPlan::Best) {
                let mut ids = IdAllocator::after(layout::max_root(&initial));
                match layout::merge_grid(&initial, &mut ids, &costs) {
                    Ok((prefix, block)) => Some(Base {
                        label: "Merge+",
                        prefix,
                        block,
                    }),
                    Err(e) if plan == LayoutPlan::Best => {
                        tracing::warn!(error = %e, "layout cannot be merged, skipping merge plan");
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                None
            }
        }
    };

    if let Some(base) = base {
        let mut interpreter = Interpreter::new(canvas, &initial)?;
        for instruction in &base.prefix {
            interpreter.apply(instruction)?;
        }
        let painted = interpreter.painted().clone();
        let ids = interpreter.ids().clone();
        let strategy = config.strategy;

        if matches!(strategy, StrategyKind::Blocks | StrategyKind::Best) {
            let name = format!("{}Blocks", base.label);
            let _span = tracing::info_span!("strategy", name = %name).entered();
            let t = clock.now();
            let mut optimizer = BlockOptimizer::new(canvas, config)?;
            let mut instructions = base.prefix.clone();
            let current = if let Some(color) = base.block.color {
                color
            } else {
                let color = optimizer.colors().color(&base.block.shape);
                instructions.push(base.block.recolor(color, &costs).instruction);
                color
            };
            let program = optimizer.improve(&base.block.shape, current, 0)?;
            instructions.extend(program.bind(&base.block.id));
            optimizer_stats = Some(optimizer.stats());
            candidates.push(Candidate {
                name,
                instructions,
                duration: clock.elapsed(&t),
            });
        }

        if matches!(strategy, StrategyKind::PixelGrid | StrategyKind::Best) {
            let _span = tracing::info_span!("strategy", name = "PixelGrid").entered();
            let t = clock.now();
            let mut grid = PixelGrid::new(canvas, config.median_epsilon);
            let best = grid.sweep(&base.block, &painted, &ids, &config.grid_cell_sizes, &config.grid_directions)?;
            if let Some(run) = best {
                let mut instructions = base.prefix.clone();
                instructions.extend(run.instructions);
                candidates.push(Candidate {
                    name: format!("{}PixelGrid {} {}", base.label, run.cell_size, run.direction),
                    instructions,
                    duration: clock.elapsed(&t),
                });
            }
        }

        if matches!(strategy, StrategyKind::Stripes | StrategyKind::Best) {
            let name = format!("{}Stripes", base.label);
            let _span = tracing::info_span!("strategy", name = %name).entered();
            let t = clock.now();
            let run = stripes::stripes(canvas, &painted, &base.block, config.stripe_step)?;
            let mut instructions = base.prefix;
            instructions.extend(run.instructions);
            candidates.push(Candidate {
                name,
                instructions,
                duration: clock.elapsed(&t),
            });
        }
    }

    let mut scored = Vec::with_capacity(candidates.len());
    let mut best: Option<(usize, u64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let replay = Interpreter::run(canvas, &initial, &candidate.instructions)?;
        let score = replay.score();
        tracing::debug!(name = %candidate.name, cost = replay.cost, similarity = replay.similarity, score, "candidate");
        if best.is_none_or(|(_, s)| score < s) {
            best = Some((index, score));
        }
        scored.push(StrategyDiagnostics {
            name: candidate.name.clone(),
            duration: candidate.duration,
            instructions: candidate.instructions.len(),
            cost: replay.cost,
            similarity: replay.similarity,
            score,
        });
    }

    // The empty program is always scored, so there is a winner.
    let (mut winner, mut score) = best.unwrap_or((0, 0));

    let mut refine_stats = None;
    let cuts = candidates[winner].instructions.iter().filter(|i| refine::is_cut(i)).count();
    if config.refine_radius > 0 && cuts > 0 {
        if cuts > config.refine_max_cuts {
            tracing::info!(cuts, limit = config.refine_max_cuts, "too many cuts, skipping refinement");
        } else {
            let name = format!("{}+Refine", scored[winner].name);
            let _span = tracing::info_span!("strategy", name = %name).entered();
            let t = clock.now();
            let refined = refine::refine(canvas, &initial, &candidates[winner].instructions, config.refine_radius)?;
            let refined_score = refined.replay.score();
            let duration = clock.elapsed(&t);
            tracing::debug!(name = %name, accepted = refined.stats.accepted, score = refined_score, "candidate");
            refine_stats = Some(refined.stats);
            scored.push(StrategyDiagnostics {
                name: name.clone(),
                duration,
                instructions: refined.instructions.len(),
                cost: refined.replay.cost,
                similarity: refined.replay.similarity,
                score: refined_score,
            });
            candidates.push(Candidate {
                name,
                instructions: refined.instructions,
                duration,
            });
            if refined_score < score {
                winner = candidates.len() - 1;
                score = refined_score;
            }
        }
    }

    let entry = &scored[winner];
    tracing::info!(strategy = %entry.name, score, cost = entry.cost, ops = entry.instructions, "winner");

    let solution = Solution {
        instructions: candidates.swap_remove(winner).instructions,
        cost: entry.cost,
        similarity: entry.similarity,
        strategy: entry.name.clone(),
    };
    let diagnostics = SolveDiagnostics {
        width: dimensions.width,
        height: dimensions.height,
        initial_blocks: initial.len(),
        winner: entry.name.clone(),
        strategies: scored,
        optimizer: optimizer_stats,
        refine: refine_stats,
        total_duration: clock.elapsed(&started),
    };
    Ok((solution, diagnostics))
}
