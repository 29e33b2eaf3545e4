//! robopaint-bench: CLI tool for running the solver and collecting diagnostics.
//!
//! Runs the painting solver on a given image file with configurable
//! parameters, printing per-strategy diagnostics. Useful for:
//!
//! - Comparing strategies (`blocks` vs `pixel-grid` vs `stripes`)
//! - Tuning search depth, median threshold and grid sweeps
//! - Measuring how long each strategy takes on real canvases
//! - Writing the winning program and a rendered preview to disk
//!
//! Two side modes work on existing program files instead of solving:
//! `--refine` nudges the cuts of a program, `--splice` renumbers a program
//! written for one block so it runs after a merge prefix.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin robopaint-bench -- [OPTIONS] <IMAGE_PATH>
//! cargo run --release --bin robopaint-bench -- --refine 2.txt --output 2.opt.txt 2.png
//! cargo run --release --bin robopaint-bench -- --layout 34.json --splice merge.txt 34.txt 34.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser, ValueEnum};
use robopaint_export::IslMetadata;
use robopaint_solver::{
    Canvas, Clock, EstimatorKind, InitialLayout, Instruction, Interpreter, LayoutPlan, SolveDiagnostics,
    SolverConfig, StrategyKind,
};
use tracing_subscriber::EnvFilter;

/// Painting program search and diagnostics for robopaint.
///
/// Solves a target image with configurable parameters and prints
/// per-strategy timing, cost and score diagnostics.
#[derive(Parser)]
#[command(name = "robopaint-bench", version)]
struct Cli {
    /// Path to the target image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Initial block layout JSON. Defaults to one white block.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Strategy to run.
    #[arg(long, value_enum, default_value_t = Strategy::Best)]
    strategy: Strategy,

    /// Block optimizer recursion depth.
    #[arg(long, default_value_t = SolverConfig::DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Geometric median convergence threshold.
    #[arg(long, default_value_t = SolverConfig::DEFAULT_MEDIAN_EPSILON)]
    median_epsilon: f64,

    /// Region color estimator.
    #[arg(long, value_enum, default_value_t = Estimation::Exact)]
    estimator: Estimation,

    /// Quad-tree levels for the quad-tree estimator.
    #[arg(long, default_value_t = SolverConfig::DEFAULT_QUAD_TREE_LEVELS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    quad_tree_levels: u32,

    /// Pixel-grid cell sizes to sweep (comma separated).
    #[arg(long, value_delimiter = ',', default_values_t = SolverConfig::DEFAULT_GRID_CELL_SIZES)]
    grid_sizes: Vec<u32>,

    /// Stripe optimizer band granularity in pixels.
    #[arg(long, default_value_t = SolverConfig::DEFAULT_STRIPE_STEP, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    stripe_step: u32,

    /// Multi-block layout handling.
    #[arg(long, value_enum, default_value_t = Plan::Best)]
    layout_plan: Plan,

    /// How far the winning program's cuts are nudged (0 disables).
    #[arg(long, default_value_t = SolverConfig::DEFAULT_REFINE_RADIUS)]
    refine_radius: u32,

    /// Skip refinement for programs with more cuts than this.
    #[arg(long, default_value_t = SolverConfig::DEFAULT_REFINE_MAX_CUTS)]
    refine_max_cuts: usize,

    /// Refine the cuts of an existing program instead of solving.
    #[arg(long, value_name = "PROGRAM", conflicts_with = "splice")]
    refine: Option<PathBuf>,

    /// Run BODY, written for a single starting block, after PREFIX, which
    /// merges the layout into one block. Ids of BODY are renumbered.
    #[arg(long, num_args = 2, value_names = ["PREFIX", "BODY"])]
    splice: Option<Vec<PathBuf>>,

    /// Top-level id BODY's working block has before renumbering.
    #[arg(long, default_value_t = 0, requires = "splice")]
    body_start: u32,

    /// Write the winning program to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Render the winning program to this PNG file.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full solver config as a JSON string.
    ///
    /// When provided, all other solver parameter flags are ignored.
    /// The JSON must be a valid `SolverConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Recursive split / recolor search.
    Blocks,
    /// Greedy scanline recoloring.
    PixelGrid,
    /// Horizontal band dynamic programming.
    Stripes,
    /// Every strategy, cheapest wins.
    Best,
}

/// Region color estimator selection.
#[derive(Clone, Copy, ValueEnum)]
enum Estimation {
    /// Geometric median over every pixel.
    Exact,
    /// Geometric median of precomputed quad-tree nodes.
    QuadTree,
}

/// Multi-block layout plan selection.
#[derive(Clone, Copy, ValueEnum)]
enum Plan {
    /// Swap or recolor blocks in place.
    Shuffle,
    /// Merge the grid into one block first.
    Merge,
    /// Try both.
    Best,
}

/// Build a [`SolverConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<SolverConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SolverConfig {
        strategy: match cli.strategy {
            Strategy::Blocks => StrategyKind::Blocks,
            Strategy::PixelGrid => StrategyKind::PixelGrid,
            Strategy::Stripes => StrategyKind::Stripes,
            Strategy::Best => StrategyKind::Best,
        },
        max_depth: cli.max_depth,
        median_epsilon: cli.median_epsilon,
        estimator: match cli.estimator {
            Estimation::Exact => EstimatorKind::Exact,
            Estimation::QuadTree => EstimatorKind::QuadTree,
        },
        quad_tree_levels: cli.quad_tree_levels,
        grid_cell_sizes: cli.grid_sizes.clone(),
        stripe_step: cli.stripe_step,
        layout_plan: match cli.layout_plan {
            Plan::Shuffle => LayoutPlan::Shuffle,
            Plan::Merge => LayoutPlan::Merge,
            Plan::Best => LayoutPlan::Best,
        },
        refine_radius: cli.refine_radius,
        refine_max_cuts: cli.refine_max_cuts,
        ..SolverConfig::default()
    })
}

/// Install a `tracing` subscriber on stderr.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_layout(path: Option<&Path>, canvas: &Canvas) -> Result<InitialLayout, String> {
    let Some(path) = path else {
        return Ok(InitialLayout::single(canvas.dimensions()));
    };
    let json = std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    InitialLayout::from_json(&json).map_err(|e| format!("Error in layout {}: {e}", path.display()))
}

fn read_program(path: &Path) -> Result<Vec<Instruction>, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    robopaint_export::parse_isl(&text).map_err(|e| format!("Error in program {}: {e}", path.display()))
}

/// Write `instructions` to `path`, reporting the outcome on stderr.
fn write_program(path: &Path, instructions: &[Instruction], metadata: &IslMetadata<'_>) {
    let text = robopaint_export::to_isl(instructions, metadata);
    match std::fs::write(path, &text) {
        Ok(()) => eprintln!("Program written to {} ({} instructions)", path.display(), instructions.len()),
        Err(e) => eprintln!("Error writing program to {}: {e}", path.display()),
    }
}

fn image_title(cli: &Cli) -> &str {
    cli.image_path.file_name().and_then(|s| s.to_str()).unwrap_or("bench")
}

/// `--refine`: nudge the cuts of an existing program and report the gain.
fn refine_program(cli: &Cli, canvas: &Canvas, layout: &InitialLayout, path: &Path, radius: u32) -> ExitCode {
    let outcome = read_program(path).and_then(|instructions| {
        let blocks = layout.validate(canvas).map_err(|e| e.to_string())?;
        let before = Interpreter::run(canvas, &blocks, &instructions)
            .map_err(|e| format!("Error replaying {}: {e}", path.display()))?
            .score();
        let refined = robopaint_solver::refine(canvas, &blocks, &instructions, radius).map_err(|e| e.to_string())?;
        Ok((before, refined))
    });
    let (before, refined) = match outcome {
        Ok(outcome) => outcome,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let after = refined.replay.score();
    println!(
        "Refined {}: {before} -> {after} ({} of {} nudges kept, {} invalid)",
        path.display(),
        refined.stats.accepted,
        refined.stats.tried,
        refined.stats.invalid,
    );

    if let Some(ref output) = cli.output {
        let score = format!(
            "refined cost={} similarity={:.1} total={after} (was {before})",
            refined.replay.cost, refined.replay.similarity,
        );
        let metadata = IslMetadata {
            title: Some(image_title(cli)),
            score: Some(&score),
            ..IslMetadata::default()
        };
        write_program(output, &refined.instructions, &metadata);
    }
    if let Some(ref preview) = cli.preview {
        write_preview(canvas, layout, &refined.instructions, preview);
    }
    ExitCode::SUCCESS
}

/// `--splice`: renumber BODY to start where PREFIX leaves its merged block.
fn splice_programs(cli: &Cli, canvas: &Canvas, layout: &InitialLayout, prefix: &Path, body: &Path) -> ExitCode {
    let outcome = read_program(prefix).and_then(|prefix_instructions| {
        let body_instructions = read_program(body)?;
        let blocks = layout.validate(canvas).map_err(|e| e.to_string())?;
        let mut interpreter = Interpreter::new(canvas, &blocks).map_err(|e| e.to_string())?;
        for instruction in &prefix_instructions {
            interpreter
                .apply(instruction)
                .map_err(|e| format!("Error replaying {}: {e}", prefix.display()))?;
        }
        let new_start = u32::try_from(interpreter.ids().peek() - 1)
            .map_err(|_| format!("{} leaves no valid working block id", prefix.display()))?;
        let spliced = robopaint_solver::splice(&prefix_instructions, &body_instructions, cli.body_start, new_start)
            .map_err(|e| e.to_string())?;
        let replay = Interpreter::run(canvas, &blocks, &spliced)
            .map_err(|e| format!("Spliced program does not replay: {e}"))?;
        Ok((new_start, spliced, replay))
    });
    let (new_start, spliced, replay) = match outcome {
        Ok(outcome) => outcome,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Spliced {} after {}: body block {} -> {new_start}, score {}",
        body.display(),
        prefix.display(),
        cli.body_start,
        replay.score(),
    );

    if let Some(ref output) = cli.output {
        let description = format!("body {} renumbered from {} to {new_start}", body.display(), cli.body_start);
        let score = format!("cost={} similarity={:.1} total={}", replay.cost, replay.similarity, replay.score());
        let metadata = IslMetadata {
            title: Some(image_title(cli)),
            description: Some(&description),
            score: Some(&score),
            ..IslMetadata::default()
        };
        write_program(output, &spliced, &metadata);
    }
    if let Some(ref preview) = cli.preview {
        write_preview(canvas, layout, &spliced, preview);
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let canvas = match Canvas::decode(&image_bytes) {
        Ok(canvas) => canvas,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let layout = match load_layout(cli.layout.as_deref(), &canvas) {
        Ok(layout) => layout,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref path) = cli.refine {
        return refine_program(&cli, &canvas, &layout, path, config.refine_radius);
    }
    if let Some([prefix, body]) = cli.splice.as_deref() {
        return splice_programs(&cli, &canvas, &layout, prefix, body);
    }

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        canvas.dimensions().width,
        canvas.dimensions().height,
    );
    eprintln!("Initial blocks: {}", layout.blocks.len());
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match robopaint_solver::solve_with_diagnostics(&canvas, &layout, &config, &StdClock) {
            Ok((solution, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write outputs on the first run only.
                if run == 0 {
                    if let Some(ref path) = cli.output {
                        let score = format!(
                            "{} cost={} similarity={:.1} total={}",
                            solution.strategy,
                            solution.cost,
                            solution.similarity,
                            solution.score(),
                        );
                        let config_json = serde_json::to_string(&config).ok();
                        let metadata = IslMetadata {
                            title: Some(image_title(&cli)),
                            score: Some(&score),
                            config_json: config_json.as_deref(),
                            ..IslMetadata::default()
                        };
                        write_program(path, &solution.instructions, &metadata);
                    }

                    if let Some(ref path) = cli.preview {
                        write_preview(&canvas, &layout, &solution.instructions, path);
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Solver error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Replay `instructions` and save the painted result as a PNG.
fn write_preview(canvas: &Canvas, layout: &InitialLayout, instructions: &[Instruction], path: &Path) {
    let replay = layout
        .validate(canvas)
        .map_err(|e| e.to_string())
        .and_then(|blocks| Interpreter::run(canvas, &blocks, instructions).map_err(|e| e.to_string()));
    match replay {
        Ok(replay) => match replay.painted.to_rgba().save(path) {
            Ok(()) => eprintln!("Preview written to {}", path.display()),
            Err(e) => eprintln!("Error writing preview to {}: {e}", path.display()),
        },
        Err(e) => eprintln!("Error rendering preview: {e}"),
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[SolveDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!("Summary ({} runs)\n{}", all_diagnostics.len(), "=".repeat(60));

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-strategy means, keyed by the first run's strategy names.
    println!();
    println!("{:<28} {:>12} {:>10}", "Strategy", "Mean (ms)", "Score");
    println!("{}", "-".repeat(52));

    for strategy in &all_diagnostics[0].strategies {
        let runs: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.strategies.iter().find(|s| s.name == strategy.name))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();
        if runs.is_empty() {
            continue;
        }
        let strategy_mean = runs.iter().sum::<f64>() / runs.len() as f64;
        println!("{:<28} {strategy_mean:>10.3}ms {:>10}", strategy.name, strategy.score);
    }
}
