//! Computes the rotated kernel bounding box and the overlap vector used to
//! shrink the valid output region.

use crate::config::ResultOrigin;
use crate::error::{EngineResult, MatchError};

/// Left/right/top/bottom margin by which the rotated kernel extends beyond
/// the query pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlap {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Overlap {
    pub fn max_margin(&self) -> i32 {
        self.left.max(self.right).max(self.top).max(self.bottom)
    }
}

/// Result of rotating a `kernel_w x kernel_h` kernel by `theta` about its
/// anchor: the bounding box size and the overlap it induces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotatedKernel {
    pub bbox_width: u32,
    pub bbox_height: u32,
    pub overlap: Overlap,
    /// `(sin theta, cos theta)`, passed verbatim to every dispatch that
    /// samples along the rotated grid.
    pub sin_cos: (f32, f32),
}

fn pivot_for(anchor: ResultOrigin, kw: f64, kh: f64) -> (f64, f64) {
    match anchor {
        ResultOrigin::Center => (kw / 2.0, kh / 2.0),
        ResultOrigin::UpperLeft => (0.0, 0.0),
    }
}

/// Compute the rotated bounding box and overlap vector for a kernel of size
/// `(kernel_w, kernel_h)` rotated by `theta` radians about the engine's
/// configured anchor.
pub fn compute(kernel_w: u32, kernel_h: u32, theta: f64, anchor: ResultOrigin) -> RotatedKernel {
    let (kw, kh) = (kernel_w as f64, kernel_h as f64);
    let (px, py) = pivot_for(anchor, kw, kh);

    let corners = [
        (0.5 - px, 0.5 - py),
        (kw - 0.5 - px, 0.5 - py),
        (0.5 - px, kh - 0.5 - py),
        (kw - 0.5 - px, kh - 0.5 - py),
    ];

    let (sin_t, cos_t) = theta.sin_cos();
    let rotated: Vec<(f64, f64)> = corners
        .iter()
        .map(|&(x, y)| (x * cos_t - y * sin_t, x * sin_t + y * cos_t))
        .collect();

    let min_x = rotated.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = rotated
        .iter()
        .map(|p| p.0)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_y = rotated.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = rotated
        .iter()
        .map(|p| p.1)
        .fold(f64::NEG_INFINITY, f64::max);

    let bbox_w = (max_x.floor() - min_x.floor() + 1.0) as i32;
    let bbox_h = (max_y.floor() - min_y.floor() + 1.0) as i32;

    let new_pivot_x = (-min_x + 0.5).floor() as i32;
    let new_pivot_y = (-min_y + 0.5).floor() as i32;

    let overlap = Overlap {
        left: new_pivot_x,
        right: bbox_w - 1 - new_pivot_x,
        top: new_pivot_y,
        bottom: bbox_h - 1 - new_pivot_y,
    };

    RotatedKernel {
        bbox_width: bbox_w.max(0) as u32,
        bbox_height: bbox_h.max(0) as u32,
        overlap,
        sin_cos: (sin_t as f32, cos_t as f32),
    }
}

/// Compute the output cost-surface size given a texture size and the
/// overlap induced by a rotated kernel.
pub fn output_shape(
    texture_w: u32,
    texture_h: u32,
    overlap: Overlap,
) -> EngineResult<(u32, u32)> {
    let w = texture_w as i64 - overlap.left as i64 - overlap.right as i64;
    let h = texture_h as i64 - overlap.top as i64 - overlap.bottom as i64;
    if w < 1 || h < 1 {
        return Err(MatchError::InvalidDimensions(
            "rotated kernel bounding box exceeds texture extents",
        ));
    }
    Ok((w as u32, h as u32))
}
