//! Drawing detected lines and edge overlays onto colour copies of an
//! image.
//!
//! Strokes are rasterised with `tiny-skia` without anti-aliasing, so
//! every covered pixel takes exactly the requested colour. Pixel
//! `(x, y)` is addressed at its centre; lines through integer
//! coordinates run through the middle of those pixels.

use tiny_skia::{IntSize, LineCap, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::types::{Channels, DetectedLine, LineSegment, PipelineError, PixelBuffer, Point};

/// Draw each line across the whole image on an RGB copy of `base`.
///
/// Each line is stroked between its [`DetectedLine::endpoints`], which
/// lie far outside any realistic image, and clipped to the image bounds.
/// Grayscale input is replicated to RGB first. `base` is not modified.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `thickness` is zero.
pub fn render_lines(
    base: &PixelBuffer,
    lines: &[DetectedLine],
    color: [u8; 3],
    thickness: u32,
) -> Result<PixelBuffer, PipelineError> {
    let spans: Vec<(Point, Point)> = lines.iter().map(DetectedLine::endpoints).collect();
    stroke_spans(base, &spans, color, thickness)
}

/// Draw finite segments on an RGB copy of `base`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `thickness` is zero.
pub fn render_segments(
    base: &PixelBuffer,
    segments: &[LineSegment],
    color: [u8; 3],
    thickness: u32,
) -> Result<PixelBuffer, PipelineError> {
    let spans: Vec<(Point, Point)> = segments.iter().map(|s| (s.start, s.end)).collect();
    stroke_spans(base, &spans, color, thickness)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn stroke_spans(
    base: &PixelBuffer,
    spans: &[(Point, Point)],
    color: [u8; 3],
    thickness: u32,
) -> Result<PixelBuffer, PipelineError> {
    if thickness == 0 {
        return Err(PipelineError::InvalidParameter(
            "line thickness must be at least 1".to_string(),
        ));
    }

    let rgb = base.to_rgb();
    let (width, height) = (rgb.width(), rgb.height());
    let Some(size) = IntSize::from_wh(width, height) else {
        // Nothing to draw on.
        return Ok(rgb);
    };

    let mut pb = PathBuilder::new();
    for (a, b) in spans {
        pb.move_to(a.x as f32, a.y as f32);
        pb.line_to(b.x as f32, b.y as f32);
    }
    let Some(path) = pb.finish() else {
        return Ok(rgb);
    };

    // Opaque RGBA, so premultiplied and straight alpha coincide.
    let rgba: Vec<u8> = rgb
        .as_raw()
        .chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect();
    let Some(mut pixmap) = Pixmap::from_vec(rgba, size) else {
        return Ok(rgb);
    };

    let stroke = Stroke {
        width: thickness as f32,
        line_cap: LineCap::Butt,
        ..Stroke::default()
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = false;

    pixmap.stroke_path(
        &path,
        &paint,
        &stroke,
        Transform::from_translate(0.5, 0.5),
        None,
    );

    let data: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    log::debug!(
        "render: {} spans on {width}x{height}, thickness {thickness}",
        spans.len()
    );
    PixelBuffer::new(width, height, Channels::Rgb, data)
}

/// Add an edge map onto an RGB copy of `image`, saturating at 255.
///
/// Edge pixels therefore show white over the image.
///
/// # Panics
///
/// Panics if `image` and `edges` differ in width or height.
#[must_use]
pub fn overlay_edges(image: &PixelBuffer, edges: &PixelBuffer) -> PixelBuffer {
    assert_eq!(
        image.dimensions(),
        edges.dimensions(),
        "edge overlay needs matching dimensions",
    );
    let mut out = image.to_rgb();
    let edges = edges.to_rgb();
    for (dst, &src) in out.data_mut().iter_mut().zip(edges.as_raw()) {
        *dst = dst.saturating_add(src);
    }
    out
}
