//! Canny edge detection with parameter validation.
//!
//! Returns a binary, single-channel image where 255 marks an edge pixel
//! and 0 marks background. The algorithm itself lives in
//! [`crate::canny`]; this module checks the thresholds and picks the
//! gradient norm.

use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, PixelBuffer};

/// How gradient magnitude is derived from the Sobel responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientNorm {
    /// `|dx| + |dy|`. Cheaper, overestimates diagonal gradients.
    L1,
    /// `sqrt(dx^2 + dy^2)`, the true Euclidean magnitude.
    #[default]
    L2,
}

impl GradientNorm {
    /// Magnitude of the gradient `(dx, dy)` under this norm.
    #[must_use]
    pub fn magnitude(self, dx: f32, dy: f32) -> f32 {
        match self {
            Self::L1 => dx.abs() + dy.abs(),
            Self::L2 => dx.hypot(dy),
        }
    }
}

/// Thresholds and norm for [`detect_edges_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CannyParams {
    /// Magnitudes below this are never edges.
    pub low_threshold: f32,
    /// Magnitudes at or above this are always edges.
    pub high_threshold: f32,
    /// Gradient norm.
    pub norm: GradientNorm,
}

impl CannyParams {
    /// Check threshold ordering and range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if either threshold is
    /// negative or not finite, or if `low_threshold > high_threshold`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [("low", self.low_threshold), ("high", self.high_threshold)] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidParameter(format!(
                    "canny {name} threshold must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.low_threshold > self.high_threshold {
            return Err(PipelineError::InvalidParameter(format!(
                "canny low threshold {} exceeds high threshold {}",
                self.low_threshold, self.high_threshold,
            )));
        }
        Ok(())
    }
}

/// Detect edges using Canny with the L2 gradient norm.
///
/// `image` should already be blurred. Pixels with gradient magnitude at
/// or above `high_threshold` are definite edges; those between the two
/// thresholds are edges only if 8-connected, possibly through other such
/// pixels, to a definite edge.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if
/// `low_threshold > high_threshold` or a threshold is negative.
pub fn detect_edges(
    image: &PixelBuffer,
    low_threshold: f32,
    high_threshold: f32,
) -> Result<PixelBuffer, PipelineError> {
    detect_edges_with(
        image,
        &CannyParams {
            low_threshold,
            high_threshold,
            norm: GradientNorm::L2,
        },
    )
}

/// Detect edges with an explicit gradient norm.
///
/// # Errors
///
/// See [`CannyParams::validate`].
pub fn detect_edges_with(
    image: &PixelBuffer,
    params: &CannyParams,
) -> Result<PixelBuffer, PipelineError> {
    params.validate()?;
    let edges = crate::canny::canny(
        image,
        params.low_threshold,
        params.high_threshold,
        params.norm,
    );
    log::debug!(
        "edges: {}x{}, thresholds {}/{} {:?}, {} edge pixels",
        edges.width(),
        edges.height(),
        params.low_threshold,
        params.high_threshold,
        params.norm,
        edges.count_nonzero(),
    );
    Ok(edges)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Channels;

    /// 100x100 image: left half 0, right half 255.
    fn step_image() -> PixelBuffer {
        PixelBuffer::gray_from_fn(100, 100, |x, _y| if x < 50 { 0 } else { 255 })
    }

    /// Textured image with edges of many strengths.
    fn ramp_image() -> PixelBuffer {
        PixelBuffer::gray_from_fn(40, 40, |x, y| {
            let v = (x * 37 + y * 11) % 97 + (x / 8) * 30;
            u8::try_from(v.min(255)).unwrap()
        })
    }

    #[test]
    fn low_above_high_is_rejected() {
        let result = detect_edges(&step_image(), 100.0, 50.0);
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let result = detect_edges(&step_image(), -1.0, 50.0);
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn equal_thresholds_are_accepted() {
        assert!(detect_edges(&step_image(), 80.0, 80.0).is_ok());
    }

    #[test]
    fn all_zero_image_has_no_edges() {
        let img = PixelBuffer::filled(30, 20, Channels::Gray, 0);
        let edges = detect_edges(&img, 50.0, 100.0).unwrap();
        assert_eq!(edges.count_nonzero(), 0);
        assert_eq!(edges.width(), 30);
        assert_eq!(edges.height(), 20);
    }

    #[test]
    fn step_edge_yields_single_vertical_line() {
        let edges = detect_edges(&step_image(), 50.0, 100.0).unwrap();
        for y in 0..100 {
            for x in 0..100 {
                let v = edges.pixel(x, y)[0];
                if (49..=50).contains(&x) {
                    continue;
                }
                assert_eq!(v, 0, "unexpected edge at ({x}, {y})");
            }
        }
        // Every row has exactly one edge pixel at the boundary.
        for y in 0..100 {
            let hits = (49..=50).filter(|&x| edges.pixel(x, y)[0] == 255).count();
            assert_eq!(hits, 1, "row {y}");
        }
    }

    #[test]
    fn output_is_binary_single_channel() {
        let edges = detect_edges(&ramp_image(), 30.0, 90.0).unwrap();
        assert_eq!(edges.channels(), Channels::Gray);
        assert!(edges.as_raw().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn raising_high_threshold_never_adds_edges() {
        let img = ramp_image();
        let mut previous = u64::MAX;
        for high in [40.0, 80.0, 160.0, 320.0, 640.0, 1280.0] {
            let count = detect_edges(&img, 40.0, high).unwrap().count_nonzero();
            assert!(count <= previous, "high={high}: {count} > {previous}");
            previous = count;
        }
    }

    #[test]
    fn l1_norm_is_accepted() {
        let params = CannyParams {
            low_threshold: 50.0,
            high_threshold: 100.0,
            norm: GradientNorm::L1,
        };
        let edges = detect_edges_with(&step_image(), &params).unwrap();
        assert!(edges.count_nonzero() > 0);
    }

    #[test]
    fn norms_agree_on_axis_aligned_gradient() {
        assert!((GradientNorm::L1.magnitude(3.0, 0.0) - 3.0).abs() < f32::EPSILON);
        assert!((GradientNorm::L2.magnitude(3.0, 4.0) - 5.0).abs() < f32::EPSILON);
        assert!((GradientNorm::L1.magnitude(3.0, -4.0) - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn input_is_not_mutated() {
        let img = step_image();
        let copy = img.clone();
        let _ = detect_edges(&img, 50.0, 100.0).unwrap();
        assert_eq!(img, copy);
    }
}
