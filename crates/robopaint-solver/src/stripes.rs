//! Horizontal band painting by dynamic programming.
//!
//! The block is peeled from the bottom: each step cuts off one band with a
//! horizontal line cut and either paints it with its mean color or leaves it,
//! then continues on the upper remainder. `best[i]` is the cheapest way to
//! finish once the remainder starts at boundary `i`; boundaries sit every
//! `step` rows.

use crate::block::Block;
use crate::canvas::Canvas;
use crate::cost::{CostModel, Operation};
use crate::geometry::{Axis, Shape};
use crate::program::Instruction;
use crate::types::{Color, SolveError};

/// Result of the band optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct StripeRun {
    /// Instructions, starting on the start block.
    pub instructions: Vec<Instruction>,
    /// Summed operation cost.
    pub cost: u64,
    /// Similarity inside the start block after the instructions.
    pub similarity: f64,
}

impl StripeRun {
    /// `cost + similarity`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> f64 {
        self.cost as f64 + self.similarity
    }
}

#[derive(Debug, Clone, Copy)]
struct Choice {
    /// Index of the boundary where the band ends.
    next: usize,
    /// Paint for the band, if any.
    color: Option<Color>,
    cost: u64,
    similarity: f64,
}

impl Choice {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self) -> f64 {
        self.cost as f64 + self.similarity
    }
}

/// Band boundaries: `start.y()`, every `step` rows, then `start.y2()`.
fn boundaries(shape: &Shape, step: u32) -> Vec<u32> {
    let mut ys: Vec<u32> = (shape.y()..shape.y2()).step_by(step as usize).collect();
    ys.push(shape.y2());
    ys
}

/// Paint `start` (a live block on `painted`) in horizontal bands.
///
/// # Errors
///
/// Returns [`SolveError::OutOfCanvas`] if `start` is off the canvas,
/// [`SolveError::InvalidConfig`] for a zero `step` and
/// [`SolveError::Geometry`] if a band shape cannot be formed.
pub fn stripes(target: &Canvas, painted: &Canvas, start: &Block, step: u32) -> Result<StripeRun, SolveError> {
    target.check(&start.shape)?;
    if step == 0 {
        return Err(SolveError::InvalidConfig("stripe step must be at least 1".to_string()));
    }
    let costs = CostModel::new(target.dimensions());
    let shape = start.shape;
    let ys = boundaries(&shape, step);
    let n = ys.len() - 1;
    let width = u64::from(shape.width());

    let mut best: Vec<Option<Choice>> = vec![None; n + 1];
    best[n] = Some(Choice {
        next: n,
        color: None,
        cost: 0,
        similarity: 0.0,
    });
    let mut totals = vec![0.0f64; n + 1];

    for i in (0..n).rev() {
        let remaining = width * u64::from(shape.y2() - ys[i]);
        let cut_cost = costs.cost(Operation::LineCut, remaining);
        let mut choice: Option<Choice> = None;

        for j in i + 1..=n {
            let band = Shape::from_corners(shape.x(), ys[i], shape.x2(), ys[j])?;
            let color = Color::from_rounded(target.mean(&band));
            let leave = painted.similarity_to(target, &band);
            let paint = target.similarity(&band, color);
            let paint_cost = costs.cost(Operation::Color, band.area());

            #[allow(clippy::cast_precision_loss)]
            let (color, cost, similarity) = if paint + (paint_cost as f64) < leave {
                (Some(color), paint_cost, paint)
            } else {
                (None, 0, leave)
            };
            let cost = if j == n { cost } else { cost + cut_cost };
            let candidate = Choice {
                next: j,
                color,
                cost,
                similarity,
            };
            if choice.is_none_or(|c| candidate.score() + totals[j] < c.score() + totals[c.next]) {
                choice = Some(candidate);
            }
        }

        if let Some(c) = choice {
            totals[i] = c.score() + totals[c.next];
        }
        best[i] = choice;
    }

    let mut instructions = Vec::new();
    let mut cost = 0;
    let mut similarity = 0.0;
    let mut block = start.id.clone();
    let mut i = 0;
    while i < n {
        let Some(choice) = best[i] else { break };
        cost += choice.cost;
        similarity += choice.similarity;
        if choice.next == n {
            if let Some(color) = choice.color {
                instructions.push(Instruction::Color { block, color });
            }
            break;
        }
        instructions.push(Instruction::LineCut {
            block: block.clone(),
            axis: Axis::Y,
            at: ys[choice.next],
        });
        if let Some(color) = choice.color {
            instructions.push(Instruction::Color {
                block: block.child(0),
                color,
            });
        }
        block = block.child(1);
        i = choice.next;
    }

    tracing::debug!(step, bands = n, cost, similarity, "stripes");
    Ok(StripeRun {
        instructions,
        cost,
        similarity,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::program::BlockId;
    use crate::types::Dimensions;

    fn banded() -> Canvas {
        Canvas::from_fn(
            Dimensions {
                width: 100,
                height: 100,
            },
            |_, y| match y {
                0..40 => Color::new(10, 120, 10, 255),
                40..70 => Color::WHITE,
                _ => Color::new(30, 30, 200, 255),
            },
        )
    }

    fn root(canvas: &Canvas) -> Block {
        Block::new(BlockId::new(0), canvas.bounds().unwrap(), Color::WHITE)
    }

    #[test]
    fn boundaries_include_both_edges() {
        let shape = Shape::new(0, 5, 10, 25).unwrap();
        assert_eq!(boundaries(&shape, 10), vec![5, 15, 25, 30]);
    }

    #[test]
    fn uniform_white_needs_nothing() {
        let canvas = Canvas::filled(
            Dimensions {
                width: 50,
                height: 50,
            },
            Color::WHITE,
        );
        let run = stripes(&canvas, &canvas, &root(&canvas), 10).unwrap();
        assert!(run.instructions.is_empty());
        assert_eq!(run.cost, 0);
    }

    #[test]
    fn bands_are_recovered_exactly() {
        let target = banded();
        let white = Canvas::filled(target.dimensions(), Color::WHITE);
        let start = root(&target);
        let run = stripes(&target, &white, &start, 10).unwrap();
        assert!(run.similarity.abs() < 1e-9);

        let replay = Interpreter::run(&target, &[start], &run.instructions).unwrap();
        assert_eq!(replay.cost, run.cost);
        assert!(replay.similarity.abs() < 1e-9);
    }

    #[test]
    fn result_never_worse_than_leaving_alone() {
        let target = banded();
        let white = Canvas::filled(target.dimensions(), Color::WHITE);
        let start = root(&target);
        let run = stripes(&target, &white, &start, 25).unwrap();
        let baseline = white.similarity_to(&target, &start.shape);
        assert!(run.score() <= baseline + 1e-9);
    }

    #[test]
    fn zero_step_is_rejected() {
        let target = banded();
        assert!(matches!(
            stripes(&target, &target, &root(&target), 0),
            Err(SolveError::InvalidConfig(_))
        ));
    }
}
