//! Axis-aligned rectangles on the canvas grid.
//!
//! All coordinates use the instruction language's convention: the origin is
//! the **bottom-left** corner of the canvas and `y` grows upward. Intervals
//! are half-open, so a [`Shape`] covers columns `x..x2` and rows `y..y2`.
//!
//! Shapes are immutable values. Splitting produces new shapes that exactly
//! tile the parent; the parent is never modified.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cut orientation for line cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Vertical cut line at a given `x`.
    X,
    /// Horizontal cut line at a given `y`.
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("x"),
            Self::Y => f.write_str("y"),
        }
    }
}

/// Geometry precondition violations.
///
/// These are programming errors in the caller: they are reported as soon as
/// they are detected and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// A shape with zero width or height (or inverted corners).
    #[error("degenerate shape: corners ({x1}, {y1}) and ({x2}, {y2}) span no area")]
    Degenerate {
        /// Left edge.
        x1: u32,
        /// Bottom edge.
        y1: u32,
        /// Right edge.
        x2: u32,
        /// Top edge.
        y2: u32,
    },

    /// A line cut coordinate outside the open interval of the shape.
    #[error("cut at {axis} = {at} is outside the interior of {shape}")]
    SplitOutOfRange {
        /// Orientation of the rejected cut.
        axis: Axis,
        /// Rejected coordinate.
        at: u32,
        /// Shape being split.
        shape: Shape,
    },

    /// Two shapes that do not share a full edge.
    #[error("{a} and {b} are not edge-adjacent with equal edge length")]
    NotAdjacent {
        /// First shape.
        a: Shape,
        /// Second shape.
        b: Shape,
    },

    /// Two shapes whose width and height differ.
    #[error("{a} and {b} differ in size")]
    SizeMismatch {
        /// First shape.
        a: Shape,
        /// Second shape.
        b: Shape,
    },

    /// A swap whose two operands are the same block.
    #[error("cannot swap {shape} with itself")]
    SelfSwap {
        /// Shape of the block.
        shape: Shape,
    },

    /// A merge needs a new top-level id and every `u32` is taken.
    #[error("no top-level block ids left")]
    IdsExhausted,
}

/// An axis-aligned rectangle with positive width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Shape {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Shape {
    /// Create a shape from its bottom-left corner and size.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] when `w` or `h` is zero.
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Result<Self, GeometryError> {
        if w == 0 || h == 0 {
            return Err(GeometryError::Degenerate {
                x1: x,
                y1: y,
                x2: x.saturating_add(w),
                y2: y.saturating_add(h),
            });
        }
        Ok(Self { x, y, w, h })
    }

    /// Create a shape from its bottom-left and top-right corners.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] unless `x1 < x2` and `y1 < y2`.
    pub const fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self, GeometryError> {
        if x2 <= x1 || y2 <= y1 {
            return Err(GeometryError::Degenerate { x1, y1, x2, y2 });
        }
        Ok(Self {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        })
    }

    /// Left edge.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Bottom edge.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.w
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.h
    }

    /// Right edge (exclusive).
    #[must_use]
    pub const fn x2(&self) -> u32 {
        self.x + self.w
    }

    /// Top edge (exclusive).
    #[must_use]
    pub const fn y2(&self) -> u32 {
        self.y + self.h
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Split with a vertical line at absolute `x` into `[left, right]`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SplitOutOfRange`] unless `x1 < x < x2`.
    pub const fn split_x(&self, x: u32) -> Result<[Self; 2], GeometryError> {
        if x <= self.x || x >= self.x2() {
            return Err(GeometryError::SplitOutOfRange {
                axis: Axis::X,
                at: x,
                shape: *self,
            });
        }
        Ok([
            Self {
                x: self.x,
                y: self.y,
                w: x - self.x,
                h: self.h,
            },
            Self {
                x,
                y: self.y,
                w: self.x2() - x,
                h: self.h,
            },
        ])
    }

    /// Split with a horizontal line at absolute `y` into `[bottom, top]`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SplitOutOfRange`] unless `y1 < y < y2`.
    pub const fn split_y(&self, y: u32) -> Result<[Self; 2], GeometryError> {
        if y <= self.y || y >= self.y2() {
            return Err(GeometryError::SplitOutOfRange {
                axis: Axis::Y,
                at: y,
                shape: *self,
            });
        }
        Ok([
            Self {
                x: self.x,
                y: self.y,
                w: self.w,
                h: y - self.y,
            },
            Self {
                x: self.x,
                y,
                w: self.w,
                h: self.y2() - y,
            },
        ])
    }

    /// Split along the given axis. See [`split_x`](Self::split_x) and
    /// [`split_y`](Self::split_y).
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SplitOutOfRange`] when `at` is not interior.
    pub const fn split(&self, axis: Axis, at: u32) -> Result<[Self; 2], GeometryError> {
        match axis {
            Axis::X => self.split_x(at),
            Axis::Y => self.split_y(at),
        }
    }

    /// Split at the point `(x, y)` into four shapes, ordered
    /// bottom-left, bottom-right, top-right, top-left.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SplitOutOfRange`] when either coordinate is
    /// not strictly inside the shape.
    pub const fn split_xy(&self, x: u32, y: u32) -> Result<[Self; 4], GeometryError> {
        let [left, right] = match self.split_x(x) {
            Ok(halves) => halves,
            Err(e) => return Err(e),
        };
        if y <= self.y || y >= self.y2() {
            return Err(GeometryError::SplitOutOfRange {
                axis: Axis::Y,
                at: y,
                shape: *self,
            });
        }
        let lower = y - self.y;
        let upper = self.y2() - y;
        Ok([
            Self { h: lower, ..left },
            Self { h: lower, ..right },
            Self {
                y,
                h: upper,
                ..right
            },
            Self {
                y,
                h: upper,
                ..left
            },
        ])
    }

    /// Whether the two shapes share at least one pixel.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !(other.x >= self.x2() || self.x >= other.x2() || other.y >= self.y2() || self.y >= other.y2())
    }

    /// Whether `other` lies entirely within `self`.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.x >= self.x && other.x2() <= self.x2() && other.y >= self.y && other.y2() <= self.y2()
    }

    /// The overlapping part of two shapes, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        Self::from_corners(x1, y1, x2, y2).ok()
    }

    /// Whether both shapes have identical width and height.
    #[must_use]
    pub const fn same_size(&self, other: &Self) -> bool {
        self.w == other.w && self.h == other.h
    }

    /// The shape covering two edge-adjacent shapes whose shared edges have
    /// equal length.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NotAdjacent`] when the shapes are not stacked
    /// vertically with equal widths or side by side with equal heights.
    pub fn union_adjacent(&self, other: &Self) -> Result<Self, GeometryError> {
        let vertical = self.x == other.x && self.w == other.w;
        let horizontal = self.y == other.y && self.h == other.h;

        if vertical && (self.y2() == other.y || other.y2() == self.y) {
            return Ok(Self {
                y: self.y.min(other.y),
                h: self.h + other.h,
                ..*self
            });
        }
        if horizontal && (self.x2() == other.x || other.x2() == self.x) {
            return Ok(Self {
                x: self.x.min(other.x),
                w: self.w + other.w,
                ..*self
            });
        }
        Err(GeometryError::NotAdjacent {
            a: *self,
            b: *other,
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]..[{}, {}]", self.x, self.y, self.x2(), self.y2())
    }
}
