//! Rectangle model and pure overlap math.
//!
//! One edge convention is used everywhere: `left_x`/`top_y` is the top-left
//! corner and `right_x`/`bottom_y` the bottom-right corner, in image pixels
//! with the origin at the top-left and y growing downward.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::RegionError;

/// Axis-aligned rectangle stored as two opposite corners.
///
/// `width()` and `height()` are always derived from the corners. When a
/// rectangle is read from JSON any stored `width`/`height` is discarded and
/// recomputed, so stale values can never disagree with the corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RectangleRepr", into = "RectangleRepr")]
pub struct Rectangle {
    pub left_x: f64,
    pub top_y: f64,
    pub right_x: f64,
    pub bottom_y: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct RectangleRepr {
    left_x: f64,
    top_y: f64,
    right_x: f64,
    bottom_y: f64,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

impl From<RectangleRepr> for Rectangle {
    fn from(repr: RectangleRepr) -> Self {
        Rectangle::new(repr.left_x, repr.top_y, repr.right_x, repr.bottom_y)
    }
}

impl From<Rectangle> for RectangleRepr {
    fn from(rect: Rectangle) -> Self {
        RectangleRepr {
            left_x: rect.left_x,
            top_y: rect.top_y,
            right_x: rect.right_x,
            bottom_y: rect.bottom_y,
            width: Some(rect.width()),
            height: Some(rect.height()),
        }
    }
}

impl Rectangle {
    pub fn new(left_x: f64, top_y: f64, right_x: f64, bottom_y: f64) -> Self {
        Self {
            left_x,
            top_y,
            right_x,
            bottom_y,
        }
    }

    /// Build from two arbitrary corner points, e.g. the start and end of a drag.
    pub fn from_points(a: (f64, f64), b: (f64, f64)) -> Self {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    /// Build from a top-left corner plus extent.
    pub fn from_xywh(left_x: f64, top_y: f64, width: f64, height: f64) -> Self {
        Self::new(left_x, top_y, left_x + width, top_y + height)
    }

    /// Signed horizontal extent, `right_x - left_x`.
    pub fn width(&self) -> f64 {
        self.right_x - self.left_x
    }

    /// Signed vertical extent, `bottom_y - top_y`.
    pub fn height(&self) -> f64 {
        self.bottom_y - self.top_y
    }

    pub fn area(&self) -> f64 {
        area(self)
    }

    /// Same geometric region with corners reordered so width/height are >= 0.
    pub fn normalized(&self) -> Self {
        Self::from_points((self.left_x, self.top_y), (self.right_x, self.bottom_y))
    }

    pub fn is_finite(&self) -> bool {
        self.left_x.is_finite()
            && self.top_y.is_finite()
            && self.right_x.is_finite()
            && self.bottom_y.is_finite()
    }

    /// True when the signed width or height is not positive.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Rejects non-finite coordinates.
    pub fn validate(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(RegionError::invalid_region(format!(
                "rectangle has non-finite coordinates: {:?}",
                self
            ))
            .into());
        }
        Ok(())
    }

    /// Rejects non-finite coordinates and non-positive width or height.
    pub fn validate_positive(&self) -> Result<()> {
        self.validate()?;
        if self.is_degenerate() {
            return Err(RegionError::invalid_region(format!(
                "rectangle must have positive width and height, got {}x{}",
                self.width(),
                self.height()
            ))
            .into());
        }
        Ok(())
    }
}

/// Absolute extents of a rectangle, independent of corner order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// Legacy signed corner differences.
///
/// `x_line = left_x - right_x` and `y_line = top_y - bottom_y`, which is
/// negative for a well-formed rectangle. Kept for interop with stored
/// fixtures only; never use it for area or overlap math.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignedLines {
    pub x_line: f64,
    pub y_line: f64,
}

pub fn dimensions(rect: &Rectangle) -> Dimensions {
    Dimensions {
        width: rect.width().abs(),
        height: rect.height().abs(),
    }
}

pub fn signed_lines(rect: &Rectangle) -> SignedLines {
    SignedLines {
        x_line: rect.left_x - rect.right_x,
        y_line: rect.top_y - rect.bottom_y,
    }
}

/// Area of the rectangle; never negative regardless of corner order.
pub fn area(rect: &Rectangle) -> f64 {
    (rect.width() * rect.height()).abs()
}

/// Axis-aligned intersection of two rectangles.
///
/// Returns `None` when the rectangles are disjoint or either one is
/// degenerate. Rectangles that only touch along an edge intersect in a
/// zero-area rectangle.
pub fn overlap(a: &Rectangle, b: &Rectangle) -> Option<Rectangle> {
    if a.is_degenerate() || b.is_degenerate() {
        return None;
    }

    let ix1 = a.left_x.max(b.left_x);
    let ix2 = (a.left_x + a.width()).min(b.left_x + b.width());
    if ix2 < ix1 {
        return None;
    }

    let iy1 = a.top_y.max(b.top_y);
    let iy2 = (a.top_y + a.height()).min(b.top_y + b.height());
    if iy2 < iy1 {
        return None;
    }

    Some(Rectangle::from_xywh(ix1, iy1, ix2 - ix1, iy2 - iy1))
}
