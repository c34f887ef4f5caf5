//! Standard Hough transform restricted to an angular window.
//!
//! Every edge pixel votes, for each angle bucket in the window, for the
//! distance bucket of the line through it. Cells that collect at least
//! `vote_threshold` votes become [`DetectedLine`]s. Peaks are taken
//! independently: two adjacent cells above threshold both produce a
//! line unless [`HoughParams::suppress_non_maxima`] is set.
//!
//! # Angle frame
//!
//! The window `[min_theta, max_theta]` is given in terms of line
//! *direction* (0 = horizontal, pi/2 = vertical). The accumulator works
//! with the polar normal form `x cos a + y sin a = r`, whose angle `a` is
//! the direction plus [`THETA_ORIGIN_OFFSET`]. A window of
//! `[pi/3, 2pi/3]` therefore selects near-vertical lines such as book
//! spines. Results are reported back in the direction frame; see
//! [`DetectedLine`].

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::types::{Channels, DetectedLine, PipelineError, PixelBuffer};

/// Offset added to the caller's window angles to obtain accumulator
/// (normal) angles.
pub const THETA_ORIGIN_OFFSET: f64 = FRAC_PI_2;

/// Named angle settings.
///
/// `Vertical` and `Horizontal` pin the window to a single direction
/// bucket; `Fine` keeps the caller's window at one-degree steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThetaPreset {
    /// Only lines running straight up and down (direction pi/2).
    Vertical,
    /// Only lines running left to right (direction 0).
    Horizontal,
    /// One degree over whatever window is configured.
    Fine,
}

impl ThetaPreset {
    /// Step size in radians. The coarse steps exceed any window they are
    /// paired with, so the window holds exactly one bucket.
    #[must_use]
    pub fn radians(self) -> f64 {
        match self {
            Self::Vertical => PI + FRAC_PI_2,
            Self::Horizontal => PI,
            Self::Fine => PI / 180.0,
        }
    }

    /// The direction the window is pinned to, `None` for `Fine`.
    #[must_use]
    pub const fn direction(self) -> Option<f64> {
        match self {
            Self::Vertical => Some(FRAC_PI_2),
            Self::Horizontal => Some(0.0),
            Self::Fine => None,
        }
    }
}

/// Parameters for [`detect_lines`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoughParams {
    /// Distance resolution in pixels.
    pub rho_resolution: f64,
    /// Angle resolution in radians.
    pub theta_resolution: f64,
    /// Minimum votes for a cell to be reported.
    pub vote_threshold: u32,
    /// Lower end of the direction window, radians.
    pub min_theta: f64,
    /// Upper end of the direction window, radians.
    pub max_theta: f64,
    /// Keep only the strongest `n` lines.
    pub max_lines: Option<usize>,
    /// Report a cell only if no 8-neighbour in the accumulator has more
    /// votes.
    pub suppress_non_maxima: bool,
}

impl HoughParams {
    /// Apply a [`ThetaPreset`]: set the angle step and, for the coarse
    /// presets, collapse the window onto their direction.
    #[must_use]
    pub fn with_preset(self, preset: ThetaPreset) -> Self {
        let (min_theta, max_theta) = preset
            .direction()
            .map_or((self.min_theta, self.max_theta), |d| (d, d));
        Self {
            theta_resolution: preset.radians(),
            min_theta,
            max_theta,
            ..self
        }
    }

    /// Default distance resolution.
    pub const DEFAULT_RHO_RESOLUTION: f64 = 1.0;
    /// Default angle resolution (one degree).
    pub const DEFAULT_THETA_RESOLUTION: f64 = PI / 180.0;
    /// Default vote threshold.
    pub const DEFAULT_VOTE_THRESHOLD: u32 = 150;
    /// Default window start: 60 degrees.
    pub const DEFAULT_MIN_THETA: f64 = PI / 3.0;
    /// Default window end: 120 degrees.
    pub const DEFAULT_MAX_THETA: f64 = 2.0 * PI / 3.0;

    /// Check resolutions, threshold and window.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for a non-positive or
    /// non-finite resolution, a zero vote threshold, a non-finite window
    /// bound, or `min_theta > max_theta`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_resolutions(self.rho_resolution, self.theta_resolution, self.vote_threshold)?;
        if !self.min_theta.is_finite() || !self.max_theta.is_finite() {
            return Err(PipelineError::InvalidParameter(format!(
                "hough window [{}, {}] must be finite",
                self.min_theta, self.max_theta,
            )));
        }
        if self.min_theta > self.max_theta {
            return Err(PipelineError::InvalidParameter(format!(
                "hough min_theta {} exceeds max_theta {}",
                self.min_theta, self.max_theta,
            )));
        }
        Ok(())
    }
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho_resolution: Self::DEFAULT_RHO_RESOLUTION,
            theta_resolution: Self::DEFAULT_THETA_RESOLUTION,
            vote_threshold: Self::DEFAULT_VOTE_THRESHOLD,
            min_theta: Self::DEFAULT_MIN_THETA,
            max_theta: Self::DEFAULT_MAX_THETA,
            max_lines: None,
            suppress_non_maxima: false,
        }
    }
}

pub(crate) fn validate_resolutions(
    rho_resolution: f64,
    theta_resolution: f64,
    vote_threshold: u32,
) -> Result<(), PipelineError> {
    for (name, value) in [("rho", rho_resolution), ("theta", theta_resolution)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "hough {name} resolution must be positive, got {value}"
            )));
        }
    }
    if vote_threshold == 0 {
        return Err(PipelineError::InvalidParameter(
            "hough vote threshold must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Largest accumulator, in cells, that [`HoughAccumulator::new`] will
/// allocate (512 MiB of `u32` votes).
pub const MAX_ACCUMULATOR_CELLS: usize = 1 << 27;

#[allow(clippy::cast_precision_loss)]
const CELL_LIMIT: f64 = MAX_ACCUMULATOR_CELLS as f64;

fn too_fine(what: &str, resolution: f64) -> PipelineError {
    PipelineError::InvalidParameter(format!(
        "hough {what} resolution {resolution} needs more than {MAX_ACCUMULATOR_CELLS} cells"
    ))
}

/// Number of angle buckets covering `[min, max]` at `step`.
///
/// When the buckets would span a full half turn, the last one duplicates
/// the first (a line at `a + pi` is the line at `a` with `r` negated) and
/// is dropped.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `step` is so small that
/// the count exceeds [`MAX_ACCUMULATOR_CELLS`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn theta_bucket_count(min: f64, max: f64, step: f64) -> Result<usize, PipelineError> {
    let steps = ((max - min) / step + 1e-9).floor();
    if !steps.is_finite() || steps >= CELL_LIMIT {
        return Err(too_fine("theta", step));
    }
    let mut count = steps as usize + 1;
    #[allow(clippy::cast_precision_loss)]
    let span = (count - 1) as f64 * step;
    if count > 1 && (PI - span).abs() < step / 2.0 {
        count -= 1;
    }
    Ok(count)
}

/// Vote grid over (angle bucket, distance bucket).
///
/// Distances cover `[-D, D]` where `D` is the image diagonal rounded up,
/// so every pixel's distance lands inside the grid.
#[derive(Debug, Clone)]
pub struct HoughAccumulator {
    votes: Vec<u32>,
    theta_bins: usize,
    rho_bins: usize,
    rho_center: usize,
    rho_resolution: f64,
    trig: Vec<(f64, f64)>,
}

impl HoughAccumulator {
    /// Empty accumulator for a `width` x `height` image whose angle
    /// buckets start at normal angle `first_angle`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the grid would hold
    /// more than [`MAX_ACCUMULATOR_CELLS`] cells.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(
        width: u32,
        height: u32,
        rho_resolution: f64,
        first_angle: f64,
        theta_step: f64,
        theta_bins: usize,
    ) -> Result<Self, PipelineError> {
        let diagonal = f64::from(width).hypot(f64::from(height)).ceil();
        let rho_center = (diagonal / rho_resolution).ceil();
        if !rho_center.is_finite() || rho_center >= CELL_LIMIT / 2.0 {
            return Err(too_fine("rho", rho_resolution));
        }
        let rho_center = rho_center as usize;
        let rho_bins = 2 * rho_center + 1;
        let cells = theta_bins
            .checked_mul(rho_bins)
            .filter(|&n| n <= MAX_ACCUMULATOR_CELLS)
            .ok_or_else(|| too_fine("combined", theta_step.min(rho_resolution)))?;
        #[allow(clippy::cast_precision_loss)]
        let trig = (0..theta_bins)
            .map(|t| {
                let (sin, cos) = theta_step.mul_add(t as f64, first_angle).sin_cos();
                (cos, sin)
            })
            .collect();
        Ok(Self {
            votes: vec![0; cells],
            theta_bins,
            rho_bins,
            rho_center,
            rho_resolution,
            trig,
        })
    }

    /// Number of angle buckets.
    #[must_use]
    pub const fn theta_bins(&self) -> usize {
        self.theta_bins
    }

    /// Number of distance buckets.
    #[must_use]
    pub const fn rho_bins(&self) -> usize {
        self.rho_bins
    }

    /// Distance represented by bucket `r`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn rho_of(&self, r: usize) -> f64 {
        (r as i64 - self.rho_center as i64) as f64 * self.rho_resolution
    }

    /// Distance bucket nearest to `rho`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    pub fn rho_index(&self, rho: f64) -> usize {
        let idx = (rho / self.rho_resolution).round() as i64 + self.rho_center as i64;
        idx.clamp(0, self.rho_bins as i64 - 1) as usize
    }

    /// Flat index of the cell that pixel `(x, y)` votes for at angle `t`.
    fn cell(&self, t: usize, x: u32, y: u32) -> usize {
        let (cos, sin) = self.trig[t];
        let rho = f64::from(x).mul_add(cos, f64::from(y) * sin);
        t * self.rho_bins + self.rho_index(rho)
    }

    /// Add one vote per angle bucket for the pixel `(x, y)`.
    pub fn vote(&mut self, x: u32, y: u32) {
        let _ = self.vote_and_best(x, y);
    }

    /// Vote for `(x, y)` and return the angle bucket and count of the
    /// strongest cell it voted for. Ties go to the lowest angle.
    pub fn vote_and_best(&mut self, x: u32, y: u32) -> (usize, u32) {
        let mut best = (0, 0);
        for t in 0..self.theta_bins {
            let i = self.cell(t, x, y);
            self.votes[i] = self.votes[i].saturating_add(1);
            if self.votes[i] > best.1 {
                best = (t, self.votes[i]);
            }
        }
        best
    }

    /// Withdraw the votes previously cast for `(x, y)`.
    pub fn unvote(&mut self, x: u32, y: u32) {
        for t in 0..self.theta_bins {
            let i = self.cell(t, x, y);
            self.votes[i] = self.votes[i].saturating_sub(1);
        }
    }

    /// Votes in cell `(t, r)`.
    #[must_use]
    pub fn get(&self, t: usize, r: usize) -> u32 {
        self.votes[t * self.rho_bins + r]
    }

    /// Largest vote count in the grid.
    #[must_use]
    pub fn max_votes(&self) -> u32 {
        self.votes.iter().copied().max().unwrap_or(0)
    }

    /// `true` if no 8-neighbour of `(t, r)` holds more votes.
    fn is_local_max(&self, t: usize, r: usize) -> bool {
        let v = self.get(t, r);
        for nt in t.saturating_sub(1)..=(t + 1).min(self.theta_bins - 1) {
            for nr in r.saturating_sub(1)..=(r + 1).min(self.rho_bins - 1) {
                if (nt, nr) != (t, r) && self.get(nt, nr) > v {
                    return false;
                }
            }
        }
        true
    }

    /// Cells with at least `threshold` votes, in angle-major scan order.
    #[must_use]
    pub fn peaks(&self, threshold: u32, suppress_non_maxima: bool) -> Vec<(usize, usize, u32)> {
        let mut out = Vec::new();
        for t in 0..self.theta_bins {
            for r in 0..self.rho_bins {
                let v = self.get(t, r);
                if v < threshold {
                    continue;
                }
                if suppress_non_maxima && !self.is_local_max(t, r) {
                    continue;
                }
                out.push((t, r, v));
            }
        }
        out
    }
}

/// Find infinite lines in a binary edge map.
///
/// Any nonzero sample counts as an edge pixel. An edge map without edge
/// pixels yields an empty result. Lines are returned strongest first.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `params` fails
/// [`HoughParams::validate`] or the resolutions would need more than
/// [`MAX_ACCUMULATOR_CELLS`] cells.
///
/// # Panics
///
/// Panics if `edges` is not single-channel.
pub fn detect_lines(
    edges: &PixelBuffer,
    params: &HoughParams,
) -> Result<Vec<DetectedLine>, PipelineError> {
    params.validate()?;
    assert_eq!(
        edges.channels(),
        Channels::Gray,
        "hough input must be a single-channel edge map",
    );

    let theta_bins =
        theta_bucket_count(params.min_theta, params.max_theta, params.theta_resolution)?;
    let mut acc = HoughAccumulator::new(
        edges.width(),
        edges.height(),
        params.rho_resolution,
        params.min_theta + THETA_ORIGIN_OFFSET,
        params.theta_resolution,
        theta_bins,
    )?;

    let mut edge_pixels = 0u64;
    for y in 0..edges.height() {
        for x in 0..edges.width() {
            if edges.pixel(x, y)[0] != 0 {
                acc.vote(x, y);
                edge_pixels += 1;
            }
        }
    }

    let mut lines: Vec<DetectedLine> = acc
        .peaks(params.vote_threshold, params.suppress_non_maxima)
        .into_iter()
        .map(|(t, r, votes)| {
            #[allow(clippy::cast_precision_loss)]
            let theta = params.theta_resolution.mul_add(t as f64, params.min_theta);
            DetectedLine {
                rho: -acc.rho_of(r),
                theta,
                votes,
            }
        })
        .collect();
    lines.sort_by(|a, b| b.votes.cmp(&a.votes));
    if let Some(max) = params.max_lines {
        lines.truncate(max);
    }

    log::debug!(
        "hough: {edge_pixels} edge pixels, {}x{} cells, max {} votes, {} lines",
        acc.theta_bins(),
        acc.rho_bins(),
        acc.max_votes(),
        lines.len(),
    );
    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DEG: f64 = PI / 180.0;

    fn full_window(threshold: u32) -> HoughParams {
        HoughParams {
            rho_resolution: 1.0,
            theta_resolution: DEG,
            vote_threshold: threshold,
            min_theta: 0.0,
            max_theta: PI,
            max_lines: None,
            suppress_non_maxima: false,
        }
    }

    fn vertical_line_map() -> PixelBuffer {
        PixelBuffer::gray_from_fn(100, 100, |x, _y| if x == 50 { 255 } else { 0 })
    }

    #[test]
    fn origin_offset_is_quarter_turn() {
        assert!((THETA_ORIGIN_OFFSET - PI / 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn theta_bucket_count_drops_duplicate_half_turn() {
        assert_eq!(theta_bucket_count(0.0, PI, DEG).unwrap(), 180);
        assert_eq!(theta_bucket_count(0.0, PI / 2.0, DEG).unwrap(), 91);
        assert_eq!(theta_bucket_count(0.3, 0.3, DEG).unwrap(), 1);
    }

    #[test]
    fn coarse_presets_pin_a_single_bucket() {
        for preset in [ThetaPreset::Vertical, ThetaPreset::Horizontal] {
            let params = HoughParams::default().with_preset(preset);
            let n = theta_bucket_count(params.min_theta, params.max_theta, params.theta_resolution);
            assert_eq!(n.unwrap(), 1, "{preset:?}");
        }
        let fine = HoughParams::default().with_preset(ThetaPreset::Fine);
        assert!((fine.min_theta - HoughParams::DEFAULT_MIN_THETA).abs() < f64::EPSILON);
        assert!((fine.max_theta - HoughParams::DEFAULT_MAX_THETA).abs() < f64::EPSILON);
        assert!((fine.theta_resolution - DEG).abs() < f64::EPSILON);
    }

    #[test]
    fn vertical_preset_keeps_vertical_lines_only() {
        let base = HoughParams {
            vote_threshold: 50,
            ..HoughParams::default()
        };
        let vertical =
            detect_lines(&vertical_line_map(), &base.clone().with_preset(ThetaPreset::Vertical))
                .unwrap();
        assert_eq!(vertical.len(), 1, "{vertical:?}");
        assert!((vertical[0].theta - PI / 2.0).abs() < 1e-9);
        assert!((vertical[0].rho - 50.0).abs() < 1e-9);
        assert_eq!(vertical[0].votes, 100);

        let horizontal =
            detect_lines(&vertical_line_map(), &base.with_preset(ThetaPreset::Horizontal))
                .unwrap();
        assert!(horizontal.is_empty(), "{horizontal:?}");
    }

    #[test]
    fn horizontal_preset_finds_horizontal_lines() {
        let edges = PixelBuffer::gray_from_fn(100, 100, |_, y| if y == 20 { 255 } else { 0 });
        let params = HoughParams {
            vote_threshold: 50,
            ..HoughParams::default()
        }
        .with_preset(ThetaPreset::Horizontal);
        let lines = detect_lines(&edges, &params).unwrap();
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].theta.abs() < 1e-9);
        assert!((lines[0].rho + 20.0).abs() < 1e-9);
    }

    #[test]
    fn resolutions_too_fine_to_allocate_are_rejected() {
        let edges = vertical_line_map();
        for params in [
            HoughParams {
                theta_resolution: 1e-300,
                ..full_window(1)
            },
            HoughParams {
                rho_resolution: 1e-18,
                ..full_window(1)
            },
            HoughParams {
                rho_resolution: 1e-4,
                ..full_window(1)
            },
        ] {
            let result = detect_lines(&edges, &params);
            assert!(
                matches!(result, Err(PipelineError::InvalidParameter(_))),
                "{params:?} should be rejected",
            );
        }
        assert!(theta_bucket_count(0.0, PI, 1e-300).is_err());
        assert!(HoughAccumulator::new(100, 100, 1e-18, 0.0, DEG, 1).is_err());
    }

    #[test]
    fn vertical_line_round_trip() {
        let lines = detect_lines(&vertical_line_map(), &full_window(80)).unwrap();
        assert!(!lines.is_empty());
        assert!(
            lines
                .iter()
                .any(|l| (l.theta - PI / 2.0).abs() <= DEG && (l.rho - 50.0).abs() <= 1.0),
            "no line near theta=pi/2, rho=50 in {lines:?}",
        );
        // The strongest line is exact.
        let best = lines[0];
        assert_eq!(best.votes, 100);
        assert!((best.theta - PI / 2.0).abs() < 1e-9);
        assert!((best.rho - 50.0).abs() < 1e-9);
    }

    #[test]
    fn horizontal_segment_matches_analytic_parameters() {
        let edges = PixelBuffer::gray_from_fn(100, 60, |x, y| {
            if y == 30 && (10..=90).contains(&x) { 255 } else { 0 }
        });
        let lines = detect_lines(&edges, &full_window(60)).unwrap();
        let best = lines[0];
        assert_eq!(best.votes, 81);
        // Direction 0, normal (0, -1): rho = -y.
        assert!(best.theta.abs() <= DEG);
        assert!((best.rho + 30.0).abs() <= 1.0);
    }

    #[test]
    fn diagonal_line_matches_analytic_parameters() {
        let edges = PixelBuffer::gray_from_fn(80, 80, |x, y| if x == y { 255 } else { 0 });
        let lines = detect_lines(&edges, &full_window(70)).unwrap();
        assert!(!lines.is_empty());
        let best = lines[0];
        assert!((best.theta - PI / 4.0).abs() <= DEG, "{best:?}");
        assert!(best.rho.abs() <= 1.0, "{best:?}");
    }

    #[test]
    fn empty_edge_map_yields_no_lines() {
        let edges = PixelBuffer::filled(64, 48, Channels::Gray, 0);
        let lines = detect_lines(&edges, &full_window(1)).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn zero_sized_edge_map_yields_no_lines() {
        let edges = PixelBuffer::filled(0, 0, Channels::Gray, 0);
        let lines = detect_lines(&edges, &full_window(1)).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn window_excludes_lines_outside_it() {
        let edges = PixelBuffer::gray_from_fn(100, 100, |x, y| {
            if x == 50 || y == 20 { 255 } else { 0 }
        });
        let params = HoughParams {
            vote_threshold: 90,
            ..HoughParams::default()
        };
        let lines = detect_lines(&edges, &params).unwrap();
        assert!(!lines.is_empty());
        for line in &lines {
            assert!(line.theta >= params.min_theta - 1e-9);
            assert!(line.theta <= params.max_theta + 1e-9);
            assert!((line.theta - PI / 2.0).abs() <= 2.0 * DEG, "{line:?}");
        }
    }

    #[test]
    fn adjacent_peaks_are_reported_independently() {
        // A thick (3 px) vertical band produces several cells above
        // threshold at the same angle.
        let edges = PixelBuffer::gray_from_fn(60, 60, |x, _| {
            if (29..=31).contains(&x) { 255 } else { 0 }
        });
        let lines = detect_lines(&edges, &full_window(60)).unwrap();
        let vertical: Vec<_> = lines
            .iter()
            .filter(|l| (l.theta - PI / 2.0).abs() < 1e-9)
            .collect();
        assert_eq!(vertical.len(), 3);
    }

    #[test]
    fn suppression_never_adds_lines() {
        let edges = PixelBuffer::gray_from_fn(60, 60, |x, _| {
            if (29..=31).contains(&x) { 255 } else { 0 }
        });
        let plain = detect_lines(&edges, &full_window(40)).unwrap();
        let suppressed = detect_lines(
            &edges,
            &HoughParams {
                suppress_non_maxima: true,
                ..full_window(40)
            },
        )
        .unwrap();
        assert!(!suppressed.is_empty());
        assert!(suppressed.len() <= plain.len());
        // The three centre columns tie and are all kept.
        let centre = suppressed
            .iter()
            .filter(|l| (l.theta - PI / 2.0).abs() < 1e-9)
            .count();
        assert_eq!(centre, 3);
    }

    #[test]
    fn max_lines_keeps_strongest() {
        let lines = detect_lines(
            &vertical_line_map(),
            &HoughParams {
                max_lines: Some(1),
                ..full_window(10)
            },
        )
        .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].votes, 100);
    }

    #[test]
    fn results_are_sorted_by_votes() {
        let lines = detect_lines(&vertical_line_map(), &full_window(20)).unwrap();
        assert!(lines.windows(2).all(|w| w[0].votes >= w[1].votes));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let edges = vertical_line_map();
        let cases = [
            HoughParams {
                rho_resolution: 0.0,
                ..full_window(1)
            },
            HoughParams {
                theta_resolution: -0.1,
                ..full_window(1)
            },
            HoughParams {
                vote_threshold: 0,
                ..full_window(1)
            },
            HoughParams {
                min_theta: 2.0,
                max_theta: 1.0,
                ..full_window(1)
            },
            HoughParams {
                max_theta: f64::NAN,
                ..full_window(1)
            },
        ];
        for params in &cases {
            let result = detect_lines(&edges, params);
            assert!(
                matches!(result, Err(PipelineError::InvalidParameter(_))),
                "{params:?} should be rejected",
            );
        }
    }

    #[test]
    fn accumulator_counts_collinear_pixels() {
        let mut acc = HoughAccumulator::new(10, 10, 1.0, 0.0, DEG, 1).unwrap();
        for y in 0..10 {
            acc.vote(4, y);
        }
        assert_eq!(acc.get(0, acc.rho_index(4.0)), 10);
        assert!((acc.rho_of(acc.rho_index(4.0)) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unvote_restores_counts() {
        let mut acc = HoughAccumulator::new(10, 10, 1.0, 0.0, DEG, 4).unwrap();
        acc.vote(3, 3);
        let (t, votes) = acc.vote_and_best(3, 4);
        assert_eq!((t, votes), (0, 2));
        acc.unvote(3, 4);
        acc.unvote(3, 3);
        assert_eq!(acc.max_votes(), 0);
    }
}
