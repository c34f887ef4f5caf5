//! Per-stage timings and counts for one run of the pipeline.
//!
//! [`process_with_diagnostics`](crate::process_with_diagnostics) fills a
//! [`PipelineDiagnostics`] as it advances. The library never reads the
//! system clock; time comes from a caller-supplied [`Clock`].
//!
//! Durations go over serde as `f64` seconds.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time source used to measure stage durations.
pub trait Clock {
    /// Timestamp type, opaque to the pipeline.
    type Instant;

    /// Read the clock.
    fn now(&self) -> Self::Instant;

    /// Time since `since` was read.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        value.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| serde::de::Error::custom(format!("invalid duration {secs}s: {e}")))
    }
}

/// Everything measured while running one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Gaussian blur.
    pub blur: StageDiagnostics,
    /// Canny edge detection.
    pub edge_detection: StageDiagnostics,
    /// Hough line detection.
    pub line_detection: StageDiagnostics,
    /// Drawing the lines over the original.
    pub render: StageDiagnostics,
    /// From the first clock reading to the last, in seconds.
    #[serde(with = "seconds")]
    pub total_duration: Duration,
    /// Image-level totals.
    pub summary: PipelineSummary,
}

/// Timing and metrics of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall time of the transition into this stage, in seconds.
    #[serde(with = "seconds")]
    pub duration: Duration,
    /// What the stage did.
    pub metrics: StageMetrics,
}

/// What each stage reports about its own work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Blur settings used.
    Blur {
        /// Kernel side length.
        kernel_size: u32,
        /// Standard deviation of the Gaussian.
        sigma: f32,
    },
    /// Hysteresis thresholds and edge density.
    EdgeDetection {
        /// Weak-edge gradient threshold.
        low_threshold: f32,
        /// Strong-edge gradient threshold.
        high_threshold: f32,
        /// Pixels set in the edge map.
        edge_pixel_count: u64,
        /// Pixels in the image.
        total_pixel_count: u64,
    },
    /// Accumulator settings and what survived them.
    LineDetection {
        /// Minimum votes for a line.
        vote_threshold: u32,
        /// Direction window, radians.
        min_theta: f64,
        /// Upper end of the window, radians.
        max_theta: f64,
        /// Lines reported.
        line_count: usize,
        /// Votes behind the strongest line, 0 if none.
        strongest_votes: u32,
    },
    /// Strokes drawn.
    Render {
        /// Lines drawn.
        line_count: usize,
        /// Stroke width in pixels.
        thickness: u32,
    },
}

/// Image-level totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Input width in pixels.
    pub image_width: u32,
    /// Input height in pixels.
    pub image_height: u32,
    /// `image_width * image_height`.
    pub pixel_count: u64,
    /// Non-zero pixels in the edge map.
    pub edge_pixel_count: u64,
    /// Lines found by the Hough stage.
    pub line_count: usize,
}

impl PipelineDiagnostics {
    /// Stage name and diagnostics, in execution order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 4] {
        [
            ("Blur", &self.blur),
            ("Edge Detection", &self.edge_detection),
            ("Line Detection", &self.line_detection),
            ("Render", &self.render),
        ]
    }

    /// Plain-text table of stage timings, for terminals.
    #[must_use]
    pub fn report(&self) -> String {
        let s = &self.summary;
        let total = millis(self.total_duration);
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{}x{} px, {} edge px, {} lines, {total:.3}ms",
            s.image_width, s.image_height, s.edge_pixel_count, s.line_count,
        );
        let _ = writeln!(out, "{:<16}{:>12}{:>8}  metrics", "stage", "time", "share");
        for (name, stage) in self.stages() {
            let ms = millis(stage.duration);
            let share = if total > 0.0 { ms / total * 100.0 } else { 0.0 };
            let _ = writeln!(
                out,
                "{name:<16}{ms:>10.3}ms{share:>7.1}%  {}",
                describe(&stage.metrics),
            );
        }
        out.truncate(out.trim_end().len());
        out
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

fn describe(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Blur { kernel_size, sigma } => {
            format!("{kernel_size}x{kernel_size} sigma {sigma:.2}")
        }
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = match *total_pixel_count {
                0 => 0.0,
                n => *edge_pixel_count as f64 * 100.0 / n as f64,
            };
            format!("thresholds {low_threshold:.1}/{high_threshold:.1}, {density:.1}% edges")
        }
        StageMetrics::LineDetection {
            vote_threshold,
            min_theta,
            max_theta,
            line_count,
            strongest_votes,
        } => format!(
            "window {:.1}..{:.1} deg, >= {vote_threshold} votes, {line_count} lines (best {strongest_votes})",
            min_theta.to_degrees(),
            max_theta.to_degrees(),
        ),
        StageMetrics::Render {
            line_count,
            thickness,
        } => format!("{line_count} strokes at {thickness}px"),
    }
}
