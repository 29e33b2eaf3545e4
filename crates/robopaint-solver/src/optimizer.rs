//! The recursive block optimizer.
//!
//! For a block with a known shape and paint, [`BlockOptimizer::improve`]
//! returns the cheapest program it can find among three kinds of candidate:
//!
//! 1. leave the block as it is,
//! 2. recolor it with its robust color, optionally followed by a nested
//!    search on the recolored block,
//! 3. cut it at one of a few fixed ratios and optimize the children, which
//!    inherit the parent's paint.
//!
//! Results are memoized by value: the same shape with the same paint and the
//! same remaining depth always gets the same relocatable [`Program`], no
//! matter where in the cut tree it occurs.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::cost::{CostModel, Operation};
use crate::estimator::{ColorCache, Estimator};
use crate::geometry::{Axis, GeometryError, Shape};
use crate::program::{Action, Program};
use crate::types::{Color, SolveError, SolverConfig};

/// Axis length above which three cut ratios are tried.
pub const WIDE_AXIS: u32 = 100;

/// Axis length above which a single middle cut is tried.
pub const NARROW_AXIS: u32 = 10;

/// Counters describing one optimizer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerStats {
    /// Searches answered from the memo.
    pub memo_hits: u64,
    /// Searches computed from scratch.
    pub memo_misses: u64,
    /// Searches stopped because no recolor could pay for itself.
    pub pruned: u64,
    /// Candidate programs compared.
    pub candidates: u64,
    /// Distinct regions whose robust color was computed.
    pub colors_estimated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    shape: Shape,
    color: Color,
    remaining: u32,
    try_recolor: bool,
}

/// Cut ratios tried along an axis of the given length.
#[must_use]
pub fn split_ratios(len: u32) -> &'static [f64] {
    if len > WIDE_AXIS {
        &[0.25, 0.5, 0.75]
    } else if len > NARROW_AXIS {
        &[0.5]
    } else {
        &[]
    }
}

/// Absolute cut coordinate at `ratio` along `[start, start + len)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn split_position(start: u32, len: u32, ratio: f64) -> u32 {
    (f64::from(start) + f64::from(len) * ratio).round() as u32
}

/// One optimizer session over one canvas.
#[derive(Debug)]
pub struct BlockOptimizer<'a> {
    colors: ColorCache<'a>,
    costs: CostModel,
    max_depth: u32,
    memo: HashMap<MemoKey, Rc<Program>>,
    stats: OptimizerStats,
}

impl<'a> BlockOptimizer<'a> {
    /// A session configured by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Geometry`] when the configured estimator cannot
    /// be built for `canvas`.
    pub fn new(canvas: &'a Canvas, config: &SolverConfig) -> Result<Self, SolveError> {
        let estimator = Estimator::from_config(canvas, config)?;
        Ok(Self::with_estimator(canvas, estimator, config.max_depth))
    }

    /// A session with an explicit estimator.
    #[must_use]
    pub fn with_estimator(canvas: &'a Canvas, estimator: Estimator, max_depth: u32) -> Self {
        Self {
            colors: ColorCache::new(canvas, estimator),
            costs: CostModel::new(canvas.dimensions()),
            max_depth,
            memo: HashMap::new(),
            stats: OptimizerStats::default(),
        }
    }

    /// Session counters so far.
    #[must_use]
    pub fn stats(&self) -> OptimizerStats {
        OptimizerStats {
            colors_estimated: self.colors.computed(),
            ..self.stats
        }
    }

    /// The shared color cache.
    pub const fn colors(&mut self) -> &mut ColorCache<'a> {
        &mut self.colors
    }

    /// Best program for a block of `shape` currently painted `current`,
    /// starting at recursion `depth`.
    ///
    /// The returned program never scores worse than leaving the block alone.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::OutOfCanvas`] when `shape` does not fit on the
    /// canvas.
    pub fn improve(&mut self, shape: &Shape, current: Color, depth: u32) -> Result<Rc<Program>, SolveError> {
        self.colors.canvas().check(shape)?;
        let _span = tracing::debug_span!("improve", %shape, %current, depth).entered();
        Ok(self.search(shape, current, depth, true)?)
    }

    fn search(&mut self, shape: &Shape, current: Color, depth: u32, try_recolor: bool) -> Result<Rc<Program>, GeometryError> {
        let key = MemoKey {
            shape: *shape,
            color: current,
            remaining: self.max_depth.saturating_sub(depth),
            try_recolor,
        };
        if let Some(program) = self.memo.get(&key) {
            self.stats.memo_hits += 1;
            tracing::trace!(%shape, %current, depth, "memo hit");
            return Ok(Rc::clone(program));
        }
        self.stats.memo_misses += 1;

        let canvas = self.colors.canvas();
        let area = shape.area();
        let current_similarity = canvas.similarity(shape, current);
        let noop = Program::noop(current_similarity);

        let color_cost = self.costs.cost(Operation::Color, area);
        #[allow(clippy::cast_precision_loss)]
        let as_score = |cost: u64| cost as f64;
        if current_similarity < as_score(color_cost) {
            // Not memoized.
            self.stats.pruned += 1;
            return Ok(Rc::new(noop));
        }

        let mut candidates = vec![noop];
        let mut best_similarity = current_similarity;

        if try_recolor {
            let estimate = self.colors.color(shape);
            if estimate != current {
                let new_similarity = canvas.similarity(shape, estimate);
                let mut recolor = Program::start(Action::Color(estimate), color_cost);
                recolor.append(&Program::noop(new_similarity));
                candidates.push(recolor);

                if depth < self.max_depth {
                    let nested = self.search(shape, estimate, depth + 1, false)?;
                    let mut recolor_then = Program::start(Action::Color(estimate), color_cost);
                    recolor_then.append(&nested);
                    candidates.push(recolor_then);
                }
                best_similarity = best_similarity.min(new_similarity);
            }
        }

        if depth < self.max_depth {
            let line_cost = self.costs.cost(Operation::LineCut, area);
            if best_similarity > as_score(2 * color_cost + line_cost) {
                for axis in [Axis::X, Axis::Y] {
                    let (start, len) = match axis {
                        Axis::X => (shape.x(), shape.width()),
                        Axis::Y => (shape.y(), shape.height()),
                    };
                    for &ratio in split_ratios(len) {
                        let at = split_position(start, len, ratio);
                        let children = shape.split(axis, at)?;
                        candidates.push(self.split_candidate(
                            Action::LineCut { axis, at },
                            line_cost,
                            &children,
                            current,
                            depth,
                        )?);
                    }
                }
            }

            let point_cost = self.costs.cost(Operation::PointCut, area);
            if best_similarity > as_score(4 * color_cost + point_cost)
                && shape.width() > WIDE_AXIS
                && shape.height() > WIDE_AXIS
            {
                let x = split_position(shape.x(), shape.width(), 0.5);
                let y = split_position(shape.y(), shape.height(), 0.5);
                let children = shape.split_xy(x, y)?;
                candidates.push(self.split_candidate(
                    Action::PointCut { x, y },
                    point_cost,
                    &children,
                    current,
                    depth,
                )?);
            }
        }

        self.stats.candidates += candidates.len() as u64;
        if depth == 0 {
            for candidate in &candidates {
                tracing::debug!(
                    %shape,
                    score = candidate.score(),
                    ops = candidate.len(),
                    "candidate"
                );
            }
        }

        let mut best_index = 0;
        for (index, candidate) in candidates.iter().enumerate().skip(1) {
            if candidate.score() < candidates[best_index].score() {
                best_index = index;
            }
        }
        let best = Rc::new(candidates.swap_remove(best_index));
        self.memo.insert(key, Rc::clone(&best));
        Ok(best)
    }

    fn split_candidate(
        &mut self,
        action: Action,
        cost: u64,
        children: &[Shape],
        current: Color,
        depth: u32,
    ) -> Result<Program, GeometryError> {
        let mut program = Program::start(action, cost);
        for (index, child) in (0u8..).zip(children) {
            let sub = self.search(child, current, depth + 1, true)?;
            program.append_child(index, &sub);
        }
        Ok(program)
    }
}
