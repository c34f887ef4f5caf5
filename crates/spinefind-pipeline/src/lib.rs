//! spinefind-pipeline: Pure image processing pipeline (sans-IO) for
//! finding the boundaries between book spines on a shelf photo.
//!
//! The stages are:
//! blur -> Canny edge detection -> windowed Hough transform -> render.
//!
//! The default Hough window keeps near-vertical lines, which on an
//! upright shelf photo are the gaps between spines. A probabilistic
//! variant ([`detect_segments`]) returns finite segments instead of
//! infinite lines.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! buffers and byte slices. Reading directories and writing files lives
//! in the `spinefind` binary.

mod canny;
pub mod blur;
pub mod decode;
pub mod diagnostics;
pub mod edge;
pub mod hough;
pub mod pipeline;
pub mod render;
pub mod segments;
pub mod types;

pub use blur::gaussian_blur;
pub use decode::decode;
pub use diagnostics::{Clock, PipelineDiagnostics};
pub use edge::{CannyParams, GradientNorm, detect_edges, detect_edges_with};
pub use hough::{HoughParams, THETA_ORIGIN_OFFSET, ThetaPreset, detect_lines};
pub use pipeline::Pipeline;
pub use render::{overlay_edges, render_lines, render_segments};
pub use segments::{SegmentParams, detect_segments};
pub use types::{
    Channels, DetectedLine, Dimensions, LineSegment, PipelineConfig, PipelineError, PixelBuffer,
    Point, ProcessResult, StagedResult,
};

use diagnostics::{PipelineSummary, StageDiagnostics};
use pipeline::{Advance, Stage};

/// Run the full pipeline on a decoded image.
///
/// # Pipeline steps
///
/// 1. Gaussian blur (`blur_kernel_size`, `blur_sigma`)
/// 2. Canny edge detection (`canny_low`, `canny_high`, `gradient_norm`)
/// 3. Hough transform inside the configured angular window
/// 4. Lines drawn onto an RGB copy of the input
///
/// An image without edges is not an error: the result has no lines and
/// the annotated image is a plain RGB copy.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if any stage parameter in
/// `config` is out of range. Validation happens before the stage runs.
pub fn process(
    image: &PixelBuffer,
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    let blurred = blur::gaussian_blur(image, config.blur_kernel_size, config.blur_sigma)?;
    let edges = edge::detect_edges_with(&blurred, &config.canny_params())?;
    let lines = hough::detect_lines(&edges, &config.hough)?;
    let annotated = render::render_lines(image, &lines, config.line_color, config.line_thickness)?;
    log::debug!(
        "process: {}x{} -> {} lines",
        image.width(),
        image.height(),
        lines.len(),
    );
    Ok(ProcessResult {
        lines,
        annotated,
        dimensions: image.dimensions(),
    })
}

/// Decode image file bytes (PNG, JPEG, BMP) and run [`process`].
///
/// # Errors
///
/// Returns [`PipelineError::ImageDecode`] if the bytes cannot be decoded,
/// otherwise as [`process`].
pub fn process_bytes(
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    let image = decode::decode(bytes)?;
    process(&image, config)
}

/// Run the pipeline stage by stage, timing each stage with `clock`.
///
/// Returns every intermediate together with per-stage diagnostics.
///
/// # Errors
///
/// As [`process`].
pub fn process_with_diagnostics(
    image: PixelBuffer,
    config: PipelineConfig,
    clock: &impl Clock,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(image, config);
    let mut stage: Stage = pending.into();
    let mut timings = Vec::with_capacity(pipeline::STAGE_COUNT - 1);

    loop {
        let before = clock.now();
        match stage.advance()? {
            Advance::Next(next) => {
                let duration = clock.elapsed(&before);
                if let Some(metrics) = next.metrics() {
                    timings.push(StageDiagnostics { duration, metrics });
                }
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }
    let total_duration = clock.elapsed(&start);
    let result = stage.complete()?;

    // Every stage after `Pending` reports metrics.
    #[allow(clippy::unreachable)]
    let [blur, edge_detection, line_detection, render]: [StageDiagnostics; 4] = timings
        .try_into()
        .unwrap_or_else(|v: Vec<_>| unreachable!("{} timed stages, expected 4", v.len()));

    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        pixel_count: u64::from(result.dimensions.width) * u64::from(result.dimensions.height),
        edge_pixel_count: result.edges.count_nonzero(),
        line_count: result.lines.len(),
    };
    let diagnostics = PipelineDiagnostics {
        blur,
        edge_detection,
        line_detection,
        render,
        total_duration,
        summary,
    };
    Ok((result, diagnostics))
}
