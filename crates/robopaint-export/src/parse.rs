//! Instruction language parser.
//!
//! Accepts what [`to_isl`](crate::to_isl) writes, plus blank lines,
//! surrounding whitespace and uppercase axis names (`[X]`, `[Y]`).

use robopaint_solver::{Axis, BlockId, Color, Instruction};

/// A line that is not a valid instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// One-based line number.
    pub line: usize,
    /// What was wrong.
    pub reason: String,
}

/// Parse program text into instructions.
///
/// # Errors
///
/// Returns a [`ParseError`] for the first malformed line.
pub fn parse_isl(text: &str) -> Result<Vec<Instruction>, ParseError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#')
        })
        .map(|(index, l)| {
            parse_line(l.trim()).map_err(|reason| ParseError {
                line: index + 1,
                reason,
            })
        })
        .collect()
}

/// The bracketed groups after the keyword, e.g. `["0.1", "x", "20"]`.
fn groups(rest: &str) -> Result<Vec<&str>, String> {
    let mut out = Vec::new();
    let mut rest = rest.trim_start();
    while !rest.is_empty() {
        let Some(body) = rest.strip_prefix('[') else {
            return Err(format!("expected '[' at {rest:?}"));
        };
        let Some(end) = body.find(']') else {
            return Err("unterminated '['".to_string());
        };
        out.push(body[..end].trim());
        rest = body[end + 1..].trim_start();
    }
    Ok(out)
}

fn block(s: &str) -> Result<BlockId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, String> {
    s.trim().parse().map_err(|_| format!("invalid {what} {s:?}"))
}

fn color(s: &str) -> Result<Color, String> {
    let channels = s
        .split(',')
        .map(|c| number::<u8>(c, "color channel"))
        .collect::<Result<Vec<u8>, String>>()?;
    let channels: [u8; 4] = channels
        .try_into()
        .map_err(|v: Vec<u8>| format!("color needs 4 channels, got {}", v.len()))?;
    Ok(Color(channels))
}

fn parse_line(line: &str) -> Result<Instruction, String> {
    let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let args = groups(rest)?;

    match (keyword.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("color", [id, c]) => Ok(Instruction::Color {
            block: block(id)?,
            color: color(c)?,
        }),
        ("cut", [id, axis, at]) => {
            let axis = match *axis {
                "x" | "X" => Axis::X,
                "y" | "Y" => Axis::Y,
                other => return Err(format!("invalid cut axis {other:?}")),
            };
            Ok(Instruction::LineCut {
                block: block(id)?,
                axis,
                at: number(at, "cut offset")?,
            })
        }
        ("cut", [id, point]) => {
            let Some((x, y)) = point.split_once(',') else {
                return Err(format!("invalid cut point {point:?}"));
            };
            Ok(Instruction::PointCut {
                block: block(id)?,
                x: number(x, "cut x")?,
                y: number(y, "cut y")?,
            })
        }
        ("merge", [a, b]) => Ok(Instruction::Merge {
            a: block(a)?,
            b: block(b)?,
        }),
        ("swap", [a, b]) => Ok(Instruction::Swap {
            a: block(a)?,
            b: block(b)?,
        }),
        ("color" | "cut" | "merge" | "swap", _) => {
            Err(format!("wrong number of arguments for {keyword:?}: {}", args.len()))
        }
        _ => Err(format!("unknown instruction {keyword:?}")),
    }
}
