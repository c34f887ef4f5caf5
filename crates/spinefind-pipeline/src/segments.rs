//! Probabilistic Hough transform producing finite line segments.
//!
//! Edge pixels are visited in a shuffled order. Each one votes over the
//! full half turn of angles; as soon as its best cell reaches the vote
//! threshold, the line through it is walked in both directions over edge
//! pixels, bridging gaps of up to `max_line_gap` missing pixels. Walked
//! pixels are removed from the pool. If the walk spans at least
//! `min_line_length` along either axis it becomes a segment and its
//! pixels' votes are withdrawn, so one physical line is reported once.
//!
//! Results depend on the visiting order, which is fixed by
//! [`SegmentParams::seed`].

use std::f64::consts::PI;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::hough::{HoughAccumulator, theta_bucket_count, validate_resolutions};
use crate::types::{Channels, LineSegment, PipelineError, PixelBuffer, Point};

/// Parameters for [`detect_segments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentParams {
    /// Distance resolution in pixels.
    pub rho_resolution: f64,
    /// Angle resolution in radians.
    pub theta_resolution: f64,
    /// Votes a pixel's best cell needs before a walk is attempted.
    pub vote_threshold: u32,
    /// Minimum extent along x or y for a walk to count as a segment.
    pub min_line_length: f64,
    /// Largest run of missing pixels bridged while walking.
    pub max_line_gap: u32,
    /// Keep at most this many segments.
    pub max_segments: Option<usize>,
    /// Seed for the pixel visiting order.
    pub seed: u64,
}

impl SegmentParams {
    /// Default vote threshold.
    pub const DEFAULT_VOTE_THRESHOLD: u32 = 50;
    /// Default minimum segment extent in pixels.
    pub const DEFAULT_MIN_LINE_LENGTH: f64 = 30.0;
    /// Default gap tolerance in pixels.
    pub const DEFAULT_MAX_LINE_GAP: u32 = 5;
    /// Default shuffle seed.
    pub const DEFAULT_SEED: u64 = 0;

    /// Check resolutions, threshold and length.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for a non-positive or
    /// non-finite resolution, a zero vote threshold, or a negative or
    /// non-finite `min_line_length`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_resolutions(self.rho_resolution, self.theta_resolution, self.vote_threshold)?;
        if !self.min_line_length.is_finite() || self.min_line_length < 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "min_line_length must be non-negative, got {}",
                self.min_line_length,
            )));
        }
        Ok(())
    }
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            rho_resolution: 1.0,
            theta_resolution: PI / 180.0,
            vote_threshold: Self::DEFAULT_VOTE_THRESHOLD,
            min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: Self::DEFAULT_MAX_LINE_GAP,
            max_segments: None,
            seed: Self::DEFAULT_SEED,
        }
    }
}

/// Pixel-stepping walker along a line through a seed pixel.
///
/// Steps one pixel along the dominant axis and a fractional amount along
/// the other, starting from the centre of the seed pixel.
#[derive(Debug, Clone, Copy)]
struct Walker {
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
}

impl Walker {
    /// Walker through `(x, y)` along direction `(ux, uy)`, reversed if
    /// `backwards`.
    fn new(x: u32, y: u32, ux: f64, uy: f64, backwards: bool) -> Self {
        let (mut dx, mut dy) = if ux.abs() >= uy.abs() {
            (ux.signum(), uy / ux.abs())
        } else {
            (ux / uy.abs(), uy.signum())
        };
        if backwards {
            dx = -dx;
            dy = -dy;
        }
        Self {
            x: f64::from(x) + 0.5,
            y: f64::from(y) + 0.5,
            dx,
            dy,
        }
    }

    /// Current pixel, or `None` once outside `width` x `height`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn pixel(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let (fx, fy) = (self.x.floor(), self.y.floor());
        if fx < 0.0 || fy < 0.0 || fx >= f64::from(width) || fy >= f64::from(height) {
            return None;
        }
        Some((fx as u32, fy as u32))
    }

    fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }
}

/// State of each pixel in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    /// Background, or an edge pixel already consumed by a walk.
    Empty,
    /// Edge pixel that has not voted yet.
    Pending,
    /// Edge pixel whose votes are in the accumulator.
    Voted,
}

struct Pool {
    width: u32,
    cells: Vec<Cell>,
}

impl Pool {
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn get(&self, x: u32, y: u32) -> Cell {
        self.cells[self.index(x, y)]
    }

    fn set(&mut self, x: u32, y: u32, cell: Cell) {
        let i = self.index(x, y);
        self.cells[i] = cell;
    }
}

/// Find finite line segments in a binary edge map.
///
/// Any nonzero sample counts as an edge pixel. The same `params` and
/// edge map always yield the same segments.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `params` fails
/// [`SegmentParams::validate`], or if the resolutions are too fine for an
/// accumulator of at most [`MAX_ACCUMULATOR_CELLS`](crate::hough::MAX_ACCUMULATOR_CELLS) cells.
///
/// # Panics
///
/// Panics if `edges` is not single-channel.
pub fn detect_segments(
    edges: &PixelBuffer,
    params: &SegmentParams,
) -> Result<Vec<LineSegment>, PipelineError> {
    params.validate()?;
    assert_eq!(
        edges.channels(),
        Channels::Gray,
        "segment input must be a single-channel edge map",
    );

    let (width, height) = (edges.width(), edges.height());
    let mut pool = Pool {
        width,
        cells: edges
            .as_raw()
            .iter()
            .map(|&v| if v == 0 { Cell::Empty } else { Cell::Pending })
            .collect(),
    };
    let mut points: Vec<(u32, u32)> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| pool.get(x, y) != Cell::Empty)
        .collect();
    let mut rng = StdRng::seed_from_u64(params.seed);
    points.shuffle(&mut rng);

    let theta_bins = theta_bucket_count(0.0, PI, params.theta_resolution)?;
    let mut acc = HoughAccumulator::new(
        width,
        height,
        params.rho_resolution,
        0.0,
        params.theta_resolution,
        theta_bins,
    )?;
    let mut segments = Vec::new();

    for &(x, y) in &points {
        if pool.get(x, y) == Cell::Empty {
            continue;
        }
        let (best_t, best_votes) = acc.vote_and_best(x, y);
        pool.set(x, y, Cell::Voted);
        if best_votes < params.vote_threshold {
            continue;
        }

        // Direction of the line whose normal angle is bucket `best_t`.
        #[allow(clippy::cast_precision_loss)]
        let (sin, cos) = (params.theta_resolution * best_t as f64).sin_cos();
        let (ux, uy) = (-sin, cos);

        let mut ends = [(x, y); 2];
        for (k, end) in ends.iter_mut().enumerate() {
            let mut walker = Walker::new(x, y, ux, uy, k == 1);
            let mut gap = 0;
            while let Some((px, py)) = walker.pixel(width, height) {
                if pool.get(px, py) != Cell::Empty {
                    gap = 0;
                    *end = (px, py);
                } else {
                    gap += 1;
                    if gap > params.max_line_gap {
                        break;
                    }
                }
                walker.advance();
            }
        }

        let good = f64::from(ends[0].0.abs_diff(ends[1].0)) >= params.min_line_length
            || f64::from(ends[0].1.abs_diff(ends[1].1)) >= params.min_line_length;

        for (k, &end) in ends.iter().enumerate() {
            let mut walker = Walker::new(x, y, ux, uy, k == 1);
            while let Some((px, py)) = walker.pixel(width, height) {
                if good && pool.get(px, py) == Cell::Voted {
                    acc.unvote(px, py);
                }
                pool.set(px, py, Cell::Empty);
                if (px, py) == end {
                    break;
                }
                walker.advance();
            }
        }

        if good {
            segments.push(LineSegment {
                start: Point::new(f64::from(ends[0].0), f64::from(ends[0].1)),
                end: Point::new(f64::from(ends[1].0), f64::from(ends[1].1)),
            });
            if params.max_segments.is_some_and(|max| segments.len() >= max) {
                break;
            }
        }
    }

    log::debug!(
        "segments: {} edge pixels, {theta_bins} angles, {} segments",
        points.len(),
        segments.len(),
    );
    Ok(segments)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(threshold: u32, min_len: f64) -> SegmentParams {
        SegmentParams {
            vote_threshold: threshold,
            min_line_length: min_len,
            max_line_gap: 3,
            ..SegmentParams::default()
        }
    }

    fn vertical_segment() -> PixelBuffer {
        PixelBuffer::gray_from_fn(80, 80, |x, y| {
            if x == 40 && (10..70).contains(&y) { 255 } else { 0 }
        })
    }

    #[test]
    fn single_vertical_line_is_spanned() {
        let segments = detect_segments(&vertical_segment(), &params(20, 30.0)).unwrap();
        assert_eq!(segments.len(), 1, "{segments:?}");
        let s = segments[0];
        assert!((s.start.x - 40.0).abs() < f64::EPSILON);
        assert!((s.end.x - 40.0).abs() < f64::EPSILON);
        let (top, bottom) = (s.start.y.min(s.end.y), s.start.y.max(s.end.y));
        assert!((top - 10.0).abs() < f64::EPSILON, "{s:?}");
        assert!((bottom - 69.0).abs() < f64::EPSILON, "{s:?}");
    }

    #[test]
    fn horizontal_line_with_small_gap_is_bridged() {
        let edges = PixelBuffer::gray_from_fn(100, 40, |x, y| {
            if y == 20 && (5..95).contains(&x) && !(48..50).contains(&x) {
                255
            } else {
                0
            }
        });
        let segments = detect_segments(&edges, &params(20, 50.0)).unwrap();
        assert_eq!(segments.len(), 1, "{segments:?}");
        assert!((segments[0].length() - 89.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_walks_are_not_reported() {
        let segments = detect_segments(&vertical_segment(), &params(20, 200.0)).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn same_seed_gives_same_segments() {
        let edges = PixelBuffer::gray_from_fn(90, 90, |x, y| {
            if x == 20 || y == 60 || x + y == 100 { 255 } else { 0 }
        });
        let p = params(15, 20.0);
        let first = detect_segments(&edges, &p).unwrap();
        let second = detect_segments(&edges, &p).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_edge_map_yields_no_segments() {
        let edges = PixelBuffer::filled(50, 50, Channels::Gray, 0);
        assert!(detect_segments(&edges, &params(1, 0.0)).unwrap().is_empty());
    }

    #[test]
    fn max_segments_caps_output() {
        let edges = PixelBuffer::gray_from_fn(90, 90, |x, _| {
            if x == 10 || x == 40 || x == 70 { 255 } else { 0 }
        });
        let p = SegmentParams {
            max_segments: Some(2),
            ..params(20, 30.0)
        };
        assert_eq!(detect_segments(&edges, &p).unwrap().len(), 2);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let edges = vertical_segment();
        for p in [
            SegmentParams {
                rho_resolution: 0.0,
                ..SegmentParams::default()
            },
            SegmentParams {
                vote_threshold: 0,
                ..SegmentParams::default()
            },
            SegmentParams {
                min_line_length: -1.0,
                ..SegmentParams::default()
            },
            SegmentParams {
                theta_resolution: 1e-300,
                ..SegmentParams::default()
            },
            SegmentParams {
                rho_resolution: 1e-18,
                ..SegmentParams::default()
            },
        ] {
            assert!(matches!(
                detect_segments(&edges, &p),
                Err(PipelineError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn walker_steps_along_dominant_axis() {
        let mut w = Walker::new(5, 5, 0.0, 1.0, false);
        assert_eq!(w.pixel(10, 10), Some((5, 5)));
        w.advance();
        assert_eq!(w.pixel(10, 10), Some((5, 6)));
        let mut back = Walker::new(0, 0, 1.0, 0.0, true);
        back.advance();
        assert_eq!(back.pixel(10, 10), None);
    }
}
