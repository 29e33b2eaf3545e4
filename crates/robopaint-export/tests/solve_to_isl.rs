//! Integration test: solve a synthetic image, export the program, parse it
//! back and replay it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{Rgba, RgbaImage};
use robopaint_export::{IslMetadata, parse_isl, to_isl};
use robopaint_solver::{Canvas, Color, Dimensions, InitialLayout, Interpreter, SolverConfig, StrategyKind, refine, solve};

fn flag() -> RgbaImage {
    RgbaImage::from_fn(120, 80, |x, y| {
        if y < 40 {
            Rgba([200, 30, 30, 255])
        } else if x < 60 {
            Rgba([30, 30, 200, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

#[test]
fn exported_program_replays_to_the_same_score() {
    let canvas = Canvas::from_rgba(&flag());
    let layout = InitialLayout::single(canvas.dimensions());
    let config = SolverConfig {
        strategy: StrategyKind::Blocks,
        max_depth: 3,
        ..SolverConfig::default()
    };
    let solution = solve(&canvas, &layout, &config).expect("solve should succeed");
    assert!(!solution.instructions.is_empty());

    let score = format!("cost={} similarity={:.1}", solution.cost, solution.similarity);
    let meta = IslMetadata {
        title: Some("flag.png"),
        score: Some(&score),
        ..IslMetadata::default()
    };
    let text = to_isl(&solution.instructions, &meta);
    eprintln!("{text}");

    let parsed = parse_isl(&text).expect("exported text should parse");
    assert_eq!(parsed, solution.instructions);

    let blocks = layout.validate(&canvas).unwrap();
    let replay = Interpreter::run(&canvas, &blocks, &parsed).unwrap();
    assert_eq!(replay.cost, solution.cost);
    assert_eq!(replay.score(), solution.score());
}

#[test]
fn hand_written_program_is_refined() {
    let canvas = Canvas::from_fn(
        Dimensions {
            width: 40,
            height: 40,
        },
        |x, _| if x < 20 { Color::BLACK } else { Color::WHITE },
    );
    let text = "# hand written\ncut [0] [X] [22]\ncolor [0.0] [0, 0, 0, 255]\n";
    let program = parse_isl(text).unwrap();
    let blocks = InitialLayout::single(canvas.dimensions()).validate(&canvas).unwrap();
    let before = Interpreter::run(&canvas, &blocks, &program).unwrap().score();

    let refined = refine(&canvas, &blocks, &program, 4).unwrap();
    assert!(refined.replay.score() < before);
    assert_eq!(
        to_isl(&refined.instructions, &IslMetadata::default()),
        "cut [0] [x] [20]\ncolor [0.0] [0, 0, 0, 255]\n"
    );
}
