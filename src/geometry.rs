//! Conversion of pixel-space boxes into normalized YOLO geometry.

use std::fmt;

use crate::types::NormalizedBox;

/// Why a box could not be normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Image width or height is not positive.
    InvalidImageSize,
    /// A coordinate or dimension is NaN or infinite.
    NonFinite,
    /// `right <= left` or `bottom <= top`.
    Degenerate,
    /// A normalized value is not strictly inside (0, 1).
    OutOfBounds,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::InvalidImageSize => "image size must be positive",
            Rejection::NonFinite => "non-finite coordinate",
            Rejection::Degenerate => "box has zero or negative extent",
            Rejection::OutOfBounds => "box touches or exceeds the image bounds",
        };
        f.write_str(reason)
    }
}

/// Normalize the box `(left, top, right, bottom)` against an image of
/// `image_width` x `image_height` pixels.
///
/// Values are never clamped: a box whose center or size falls on or outside
/// the open interval (0, 1), including after rounding to the six digits
/// written to label files, is rejected.
pub fn normalize(
    class_id: usize,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    image_width: f64,
    image_height: f64,
) -> Result<NormalizedBox, Rejection> {
    if [left, top, right, bottom, image_width, image_height]
        .iter()
        .any(|v| !v.is_finite())
    {
        return Err(Rejection::NonFinite);
    }
    if image_width <= 0.0 || image_height <= 0.0 {
        return Err(Rejection::InvalidImageSize);
    }
    if right <= left || bottom <= top {
        return Err(Rejection::Degenerate);
    }

    let x_center = (left + right) / 2.0 / image_width;
    let y_center = (top + bottom) / 2.0 / image_height;
    let width = (right - left) / image_width;
    let height = (bottom - top) / image_height;

    if ![x_center, y_center, width, height]
        .iter()
        .all(|&v| in_open_unit(v) && in_open_unit(round6(v)))
    {
        return Err(Rejection::OutOfBounds);
    }

    Ok(NormalizedBox {
        class_id,
        x_center,
        y_center,
        width,
        height,
    })
}

fn in_open_unit(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
