//! Instruction language serializer.
//!
//! Each [`Instruction`] becomes one line. Line cuts name their axis in
//! lowercase (`[x]` / `[y]`), colors are written channel by channel.
//!
//! Lines beginning with `#` are metadata comments, skipped by the scoring
//! service and by [`parse_isl`](crate::parse_isl).
//!
//! This is a pure function with no I/O; it returns a `String`.

use std::fmt::{self, Write};

use robopaint_solver::Instruction;

/// Metadata to embed as `#`-prefixed comment lines at the top of the
/// program.
///
/// All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct IslMetadata<'a> {
    /// Source image filename, emitted as `# Source: <filename>`.
    pub title: Option<&'a str>,

    /// Free-form description, emitted as `#` comments.
    pub description: Option<&'a str>,

    /// Score summary, emitted as `# Score: <text>`.
    pub score: Option<&'a str>,

    /// Full `SolverConfig` JSON, emitted as `# Config: <json>`.
    pub config_json: Option<&'a str>,
}

impl IslMetadata<'_> {
    const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.score.is_none() && self.config_json.is_none()
    }
}

/// Write one instruction, without a trailing newline.
///
/// # Errors
///
/// Propagates formatter errors from `out`.
pub fn write_instruction<W: Write>(out: &mut W, instruction: &Instruction) -> fmt::Result {
    match instruction {
        Instruction::Color { block, color } => write!(out, "color [{block}] {color}"),
        Instruction::LineCut { block, axis, at } => write!(out, "cut [{block}] [{axis}] [{at}]"),
        Instruction::PointCut { block, x, y } => write!(out, "cut [{block}] [{x}, {y}]"),
        Instruction::Merge { a, b } => write!(out, "merge [{a}] [{b}]"),
        Instruction::Swap { a, b } => write!(out, "swap [{a}] [{b}]"),
    }
}

/// Serialize `instructions` into program text, one per line.
///
/// A header is emitted only when some metadata is present, so a program
/// with default metadata is exactly the instruction lines.
///
/// # Examples
///
/// ```
/// use robopaint_export::{IslMetadata, to_isl};
/// use robopaint_solver::{Axis, BlockId, Color, Instruction};
///
/// let program = vec![
///     Instruction::LineCut { block: BlockId::new(0), axis: Axis::X, at: 200 },
///     Instruction::Color { block: BlockId::new(0).child(0), color: Color::BLACK },
/// ];
/// let text = to_isl(&program, &IslMetadata::default());
/// assert_eq!(text, "cut [0] [x] [200]\ncolor [0.0] [0, 0, 0, 255]\n");
/// ```
#[must_use]
pub fn to_isl(instructions: &[Instruction], metadata: &IslMetadata<'_>) -> String {
    let mut out = String::new();

    if !metadata.is_empty() {
        let _ = writeln!(out, "# robopaint");
    }
    if let Some(title) = metadata.title {
        for line in title.lines() {
            let _ = writeln!(out, "# Source: {line}");
        }
    }
    if let Some(description) = metadata.description {
        for line in description.lines() {
            let _ = writeln!(out, "# {line}");
        }
    }
    if let Some(score) = metadata.score {
        for line in score.lines() {
            let _ = writeln!(out, "# Score: {line}");
        }
    }
    if let Some(config_json) = metadata.config_json {
        for line in config_json.lines() {
            let _ = writeln!(out, "# Config: {line}");
        }
    }

    for instruction in instructions {
        let _ = write_instruction(&mut out, instruction);
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use robopaint_solver::{Axis, BlockId, Color};

    use super::*;

    fn id(s: &str) -> BlockId {
        s.parse().unwrap()
    }

    fn line(instruction: &Instruction) -> String {
        let mut s = String::new();
        write_instruction(&mut s, instruction).unwrap();
        s
    }

    #[test]
    fn color_line() {
        let i = Instruction::Color {
            block: id("3.0.2"),
            color: Color::new(12, 34, 56, 255),
        };
        assert_eq!(line(&i), "color [3.0.2] [12, 34, 56, 255]");
    }

    #[test]
    fn line_cut_lines() {
        let x = Instruction::LineCut {
            block: id("0"),
            axis: Axis::X,
            at: 200,
        };
        let y = Instruction::LineCut {
            block: id("0.1"),
            axis: Axis::Y,
            at: 17,
        };
        assert_eq!(line(&x), "cut [0] [x] [200]");
        assert_eq!(line(&y), "cut [0.1] [y] [17]");
    }

    #[test]
    fn point_cut_line() {
        let i = Instruction::PointCut {
            block: id("7"),
            x: 40,
            y: 360,
        };
        assert_eq!(line(&i), "cut [7] [40, 360]");
    }

    #[test]
    fn merge_and_swap_lines() {
        let m = Instruction::Merge {
            a: id("0.0"),
            b: id("0.1"),
        };
        let s = Instruction::Swap {
            a: id("4"),
            b: id("9"),
        };
        assert_eq!(line(&m), "merge [0.0] [0.1]");
        assert_eq!(line(&s), "swap [4] [9]");
    }

    #[test]
    fn empty_program_without_metadata_is_empty() {
        assert_eq!(to_isl(&[], &IslMetadata::default()), "");
    }

    #[test]
    fn metadata_emitted_in_order() {
        let meta = IslMetadata {
            title: Some("1.png"),
            description: Some("max_depth=5"),
            score: Some("cost=17 similarity=0"),
            config_json: Some("{}"),
        };
        let text = to_isl(&[], &meta);
        let header = text.find("# robopaint").unwrap();
        let source = text.find("# Source: 1.png").unwrap();
        let description = text.find("# max_depth=5").unwrap();
        let score = text.find("# Score: cost=17").unwrap();
        let config = text.find("# Config: {}").unwrap();
        assert!(header < source);
        assert!(source < description);
        assert!(description < score);
        assert!(score < config);
        assert!(text.lines().all(|l| l.starts_with('#')));
    }

    #[test]
    fn multiline_description_is_commented_per_line() {
        let meta = IslMetadata {
            description: Some("a\nb"),
            ..IslMetadata::default()
        };
        let text = to_isl(&[], &meta);
        assert!(text.contains("# a\n# b\n"));
    }
}
