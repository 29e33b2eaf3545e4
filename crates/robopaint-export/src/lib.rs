//! robopaint-export: Pure serializer and parser for the instruction
//! language (sans-IO).
//!
//! Programs are written as one instruction per line:
//!
//! ```text
//! cut [0] [x] [200]
//! color [0.0] [0, 0, 0, 255]
//! cut [0.1] [100, 300]
//! merge [0.1.0] [0.1.1]
//! swap [0.1.2] [0.1.3]
//! ```
//!
//! Lines starting with `#` are comments.

pub mod isl;
pub mod parse;

pub use isl::{IslMetadata, to_isl, write_instruction};
pub use parse::{ParseError, parse_isl};
