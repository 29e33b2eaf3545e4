//! Solve diagnostics: timing, program sizes and search counters per strategy.
//!
//! Every call to [`solve_with_diagnostics`](crate::solve_with_diagnostics)
//! collects these alongside the solution. They exist for tuning search
//! parameters and comparing strategies on real canvases.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::optimizer::OptimizerStats;
use crate::refine::RefineStats;

/// `Duration` fields written as a bare `f64` of seconds.
mod seconds {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Duration::try_from_secs_f64(f64::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// Source of timestamps.
///
/// The solver never reads the system clock itself; callers pass an
/// implementation (the CLI uses `std::time::Instant`).
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Useful when timings are not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// One scored candidate program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDiagnostics {
    /// Strategy label, e.g. `"Blocks"` or `"PixelGrid 20 up-right"`.
    pub name: String,
    /// Wall time spent producing the candidate.
    #[serde(with = "seconds")]
    pub duration: Duration,
    /// Number of instructions, prefix included.
    pub instructions: usize,
    /// Replayed operation cost.
    pub cost: u64,
    /// Replayed similarity.
    pub similarity: f64,
    /// `cost + round(similarity)`.
    pub score: u64,
}

/// Diagnostics collected from one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Number of blocks in the initial layout.
    pub initial_blocks: usize,
    /// Every candidate that was scored, in evaluation order.
    pub strategies: Vec<StrategyDiagnostics>,
    /// Block optimizer counters, when that strategy ran.
    pub optimizer: Option<OptimizerStats>,
    /// Cut refinement counters, when the winner was refined.
    pub refine: Option<RefineStats>,
    /// Name of the winning candidate.
    pub winner: String,
    /// Wall time of the whole solve.
    #[serde(with = "seconds")]
    pub total_duration: Duration,
}

impl SolveDiagnostics {
    /// The winning candidate's entry.
    #[must_use]
    pub fn winning(&self) -> Option<&StrategyDiagnostics> {
        self.strategies.iter().find(|s| s.name == self.winner)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Solve Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Canvas: {}x{} ({} initial blocks)",
            self.width, self.height, self.initial_blocks,
        ));
        lines.push(format!("Total duration: {:.3}ms", duration_ms(self.total_duration)));
        lines.push(String::new());

        lines.push(format!(
            "{:<28} {:>10} {:>6} {:>8} {:>12} {:>8}",
            "Strategy", "Duration", "Ops", "Cost", "Similarity", "Score"
        ));
        lines.push("-".repeat(80));
        for s in &self.strategies {
            let marker = if s.name == self.winner { " *" } else { "" };
            lines.push(format!(
                "{:<28} {:>8.3}ms {:>6} {:>8} {:>12.1} {:>8}{marker}",
                s.name,
                duration_ms(s.duration),
                s.instructions,
                s.cost,
                s.similarity,
                s.score,
            ));
        }

        if let Some(stats) = &self.optimizer {
            lines.push(String::new());
            lines.push(format!(
                "Optimizer: memo {} hits / {} misses  |  pruned {}  |  candidates {}  |  colors {}",
                stats.memo_hits, stats.memo_misses, stats.pruned, stats.candidates, stats.colors_estimated,
            ));
        }

        if let Some(stats) = &self.refine {
            lines.push(format!(
                "Refine: {} of {} nudges kept  |  {} invalid",
                stats.accepted, stats.tried, stats.invalid,
            ));
        }

        lines.push(String::new());
        lines.push(format!("Winner: {}", self.winner));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
