//! Gaussian blur for noise reduction before edge detection.
//!
//! The kernel is square with an explicit odd side length and standard
//! deviation. Because the 2D Gaussian is separable it is applied as a
//! horizontal then a vertical 1D pass, each channel independently.
//! Samples beyond the image border are mirrored without repeating the
//! edge sample (`gfedcb|abcdefgh|gfedcba`), so flat regions stay flat
//! right up to the border.

use crate::types::{PipelineError, PixelBuffer};

/// Build a normalised 1D Gaussian kernel of `size` taps.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `size` is even or zero,
/// or if `sigma` is not a finite positive number.
pub fn gaussian_kernel(size: u32, sigma: f32) -> Result<Vec<f32>, PipelineError> {
    if size == 0 || size % 2 == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "blur kernel size must be odd and at least 1, got {size}"
        )));
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(PipelineError::InvalidParameter(format!(
            "blur sigma must be positive, got {sigma}"
        )));
    }

    #[allow(clippy::cast_precision_loss)]
    let radius = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    #[allow(clippy::cast_precision_loss)]
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}

/// Apply a `kernel_size` x `kernel_size` Gaussian blur.
///
/// Output has the same dimensions and channel layout as the input.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for an even or zero
/// `kernel_size` or a non-positive `sigma`. Nothing is computed in that
/// case.
#[allow(clippy::cast_possible_wrap)]
pub fn gaussian_blur(
    image: &PixelBuffer,
    kernel_size: u32,
    sigma: f32,
) -> Result<PixelBuffer, PipelineError> {
    let kernel = gaussian_kernel(kernel_size, sigma)?;
    log::debug!(
        "blur: {}x{} {:?}, kernel {kernel_size}, sigma {sigma}",
        image.width(),
        image.height(),
        image.channels(),
    );

    let mut out = image.clone();
    if image.is_empty() || kernel.len() == 1 {
        return Ok(out);
    }

    let w = image.width() as usize;
    let h = image.height() as usize;
    let n = image.channels().count();
    let radius = kernel.len() / 2;
    let src = image.as_raw();

    // Horizontal pass into a float scratch buffer.
    let mut horizontal = vec![0.0f32; src.len()];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            for c in 0..n {
                let mut acc = 0.0f32;
                for (k, &kv) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + k as isize - radius as isize, w);
                    acc += f32::from(src[(row + sx) * n + c]) * kv;
                }
                horizontal[(row + x) * n + c] = acc;
            }
        }
    }

    // Vertical pass back to u8.
    let dst = out.data_mut();
    for y in 0..h {
        for x in 0..w {
            for c in 0..n {
                let mut acc = 0.0f32;
                for (k, &kv) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - radius as isize, h);
                    acc += horizontal[(sy * w + x) * n + c] * kv;
                }
                dst[(y * w + x) * n + c] = quantize(acc);
            }
        }
    }

    Ok(out)
}

/// Map a possibly out-of-range index into `0..len` by mirroring about
/// the end samples without repeating them.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = (2 * len - 2) as isize;
    let r = i.rem_euclid(period) as usize;
    if r < len { r } else { 2 * len - 2 - r }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
