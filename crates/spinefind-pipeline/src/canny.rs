//! Canny edge detection internals: gradients, non-maximum suppression,
//! and hysteresis linking.
//!
//! The input is expected to be smoothed already; no blur happens here.
//! Gradients come from the 3x3 Sobel kernels in `imageproc` with
//! replicated borders. On multi-channel input each pixel takes the
//! gradient of whichever channel changes most.
//!
//! The public entry points with parameter validation live in
//! [`crate::edge`].

use image::Luma;
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::edge::GradientNorm;
use crate::types::{Channels, PixelBuffer};

/// Sample value written for edge pixels.
pub const EDGE: u8 = 255;

/// Gradient direction quantised to the four neighbour axes.
///
/// Names describe the direction of the gradient, not of the edge: a
/// vertical intensity boundary has a [`Horizontal`](Self::Horizontal)
/// gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Around 0 degrees: compare left and right neighbours.
    Horizontal,
    /// Around 45 degrees (down-right in image coordinates).
    Diagonal45,
    /// Around 90 degrees: compare neighbours above and below.
    Vertical,
    /// Around 135 degrees (down-left in image coordinates).
    Diagonal135,
}

impl Direction {
    /// Bucket a gradient vector. Opposite vectors share a bucket.
    #[must_use]
    pub fn from_gradient(gx: f32, gy: f32) -> Self {
        let mut angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if !(22.5..157.5).contains(&angle) {
            Self::Horizontal
        } else if angle < 67.5 {
            Self::Diagonal45
        } else if angle < 112.5 {
            Self::Vertical
        } else {
            Self::Diagonal135
        }
    }

    /// Offsets of the two neighbours along the gradient, "previous" first.
    const fn neighbours(self) -> [(i64, i64); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Diagonal45 => [(-1, -1), (1, 1)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::Diagonal135 => [(1, -1), (-1, 1)],
        }
    }
}

/// Per-pixel gradient magnitude and quantised direction.
#[derive(Debug, Clone)]
pub struct GradientField {
    width: u32,
    height: u32,
    magnitude: Vec<f32>,
    direction: Vec<Direction>,
}

impl GradientField {
    /// Compute Sobel gradients of every channel and keep the strongest.
    #[must_use]
    pub fn compute(image: &PixelBuffer, norm: GradientNorm) -> Self {
        let (width, height) = (image.width(), image.height());
        let len = width as usize * height as usize;
        let mut magnitude = vec![0.0f32; len];
        let mut direction = vec![Direction::Horizontal; len];

        for c in 0..image.channels().count() {
            let plane = image.channel_plane(c);
            let gx: Image<Luma<i16>> = filter_clamped(&plane, kernel::SOBEL_HORIZONTAL_3X3);
            let gy: Image<Luma<i16>> = filter_clamped(&plane, kernel::SOBEL_VERTICAL_3X3);
            for (i, (h, v)) in gx.iter().zip(gy.iter()).enumerate() {
                let (dx, dy) = (f32::from(*h), f32::from(*v));
                let m = norm.magnitude(dx, dy);
                if m > magnitude[i] {
                    magnitude[i] = m;
                    direction[i] = Direction::from_gradient(dx, dy);
                }
            }
        }

        Self {
            width,
            height,
            magnitude,
            direction,
        }
    }

    /// Magnitude at `(x, y)`, or zero outside the image.
    fn magnitude_at(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return 0.0;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        self.magnitude[y as usize * self.width as usize + x as usize]
    }

    /// Largest magnitude in the field.
    #[must_use]
    pub fn max_magnitude(&self) -> f32 {
        self.magnitude.iter().copied().fold(0.0, f32::max)
    }

    /// Thin edges to one pixel: zero every magnitude that is not a local
    /// maximum along its gradient direction.
    ///
    /// A pixel must beat its previous neighbour strictly and at least
    /// tie its next one, so a two-pixel plateau keeps exactly one pixel.
    #[must_use]
    pub fn non_maximum_suppression(&self) -> Vec<f32> {
        let mut out = vec![0.0f32; self.magnitude.len()];
        for y in 0..i64::from(self.height) {
            for x in 0..i64::from(self.width) {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let i = y as usize * self.width as usize + x as usize;
                let m = self.magnitude[i];
                if m <= 0.0 {
                    continue;
                }
                let [(px, py), (nx, ny)] = self.direction[i].neighbours();
                let prev = self.magnitude_at(x + px, y + py);
                let next = self.magnitude_at(x + nx, y + ny);
                if m > prev && m >= next {
                    out[i] = m;
                }
            }
        }
        out
    }
}

/// Double threshold with hysteresis linking.
///
/// Magnitudes at or above `high` seed edges; a seed's 8-connected
/// neighbours at or above `low` join it, transitively. The result is the
/// set reachable from any seed, independent of scan order.
#[must_use]
pub fn hysteresis(thinned: &[f32], width: u32, height: u32, low: f32, high: f32) -> PixelBuffer {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; w * h];
    let mut stack = Vec::new();

    let is_candidate = |m: f32| m > 0.0 && m >= low;

    for seed in 0..thinned.len() {
        if out[seed] == EDGE || thinned[seed] <= 0.0 || thinned[seed] < high {
            continue;
        }
        out[seed] = EDGE;
        stack.push(seed);
        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let j = ny * w + nx;
                    if out[j] == 0 && is_candidate(thinned[j]) {
                        out[j] = EDGE;
                        stack.push(j);
                    }
                }
            }
        }
    }

    PixelBuffer::new(width, height, Channels::Gray, out)
        .unwrap_or_else(|_| PixelBuffer::filled(width, height, Channels::Gray, 0))
}

/// Full Canny on an already-blurred image. Thresholds must be validated
/// by the caller.
#[must_use]
pub fn canny(image: &PixelBuffer, low: f32, high: f32, norm: GradientNorm) -> PixelBuffer {
    let field = GradientField::compute(image, norm);
    let thinned = field.non_maximum_suppression();
    log::trace!(
        "canny: max gradient {:.1}, {} pixels survive suppression",
        field.max_magnitude(),
        thinned.iter().filter(|&&m| m > 0.0).count(),
    );
    hysteresis(&thinned, image.width(), image.height(), low, high)
}
