//! spinefind: batch driver that marks book-spine boundaries in photos.
//!
//! Every JPEG, PNG and BMP file directly inside the input directory is run
//! through the pipeline, and the detected boundary lines are drawn into a
//! `<stem>_hough.png` next to the input (or into `--output-dir`).
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin spinefind -- [OPTIONS] [DIR]
//! ```
//!
//! Set `RUST_LOG=debug` for per-stage logging from the pipeline.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod discover;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use spinefind_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use spinefind_pipeline::{
    GradientNorm, HoughParams, PipelineConfig, PixelBuffer, SegmentParams, StagedResult,
    ThetaPreset,
};

use discover::Output;

/// Find the boundaries between book spines in shelf photos.
///
/// Runs blur, Canny edge detection and a windowed Hough transform on each
/// image and writes the detected lines drawn over the input.
#[derive(Parser)]
#[command(name = "spinefind", version)]
struct Cli {
    /// Directory containing the input images.
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Where to write outputs. Defaults to the input directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Gaussian blur kernel side length (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_KERNEL_SIZE)]
    blur_kernel_size: u32,

    /// Gaussian blur sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Canny low threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Gradient magnitude norm.
    #[arg(long, value_enum, default_value_t = Norm::L2)]
    gradient_norm: Norm,

    /// Hough distance resolution in pixels.
    #[arg(long, default_value_t = HoughParams::DEFAULT_RHO_RESOLUTION)]
    rho: f64,

    /// Hough angle resolution in radians. Ignored by the line detector
    /// with `--theta-preset`.
    #[arg(long, default_value_t = HoughParams::DEFAULT_THETA_RESOLUTION)]
    theta: f64,

    /// Named angle setting; `vertical` and `horizontal` also replace the
    /// direction window.
    #[arg(long, value_enum)]
    theta_preset: Option<Preset>,

    /// Minimum accumulator votes for a line.
    #[arg(long, default_value_t = HoughParams::DEFAULT_VOTE_THRESHOLD)]
    vote_threshold: u32,

    /// Lower end of the line direction window, radians.
    #[arg(long, default_value_t = HoughParams::DEFAULT_MIN_THETA, allow_negative_numbers = true)]
    min_theta: f64,

    /// Upper end of the line direction window, radians.
    #[arg(long, default_value_t = HoughParams::DEFAULT_MAX_THETA, allow_negative_numbers = true)]
    max_theta: f64,

    /// Keep only the strongest N lines.
    #[arg(long)]
    max_lines: Option<usize>,

    /// Drop accumulator cells that have a stronger 8-neighbour.
    #[arg(long)]
    suppress: bool,

    /// Line colour as `R,G,B`.
    #[arg(long, value_parser = parse_color, default_value = "255,0,0")]
    line_color: [u8; 3],

    /// Line thickness in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LINE_THICKNESS)]
    line_thickness: u32,

    /// Also write the edge map and an edge overlay.
    #[arg(long)]
    edges: bool,

    /// Also run the probabilistic detector and write its segments.
    #[arg(long)]
    segments: bool,

    /// Minimum votes for a probabilistic segment.
    #[arg(long, default_value_t = SegmentParams::DEFAULT_VOTE_THRESHOLD)]
    segment_threshold: u32,

    /// Shortest segment kept, in pixels.
    #[arg(long, default_value_t = SegmentParams::DEFAULT_MIN_LINE_LENGTH)]
    min_line_length: f64,

    /// Longest gap bridged inside a segment, in pixels.
    #[arg(long, default_value_t = SegmentParams::DEFAULT_MAX_LINE_GAP)]
    max_line_gap: u32,

    /// Seed for the probabilistic detector's point order.
    #[arg(long, default_value_t = SegmentParams::DEFAULT_SEED)]
    seed: u64,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Gradient norm selection.
#[derive(Clone, Copy, ValueEnum)]
enum Norm {
    /// `|dx| + |dy|`.
    L1,
    /// Euclidean magnitude.
    L2,
}

/// Angle presets.
#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Only vertical lines.
    Vertical,
    /// Only horizontal lines.
    Horizontal,
    /// One-degree steps over the window.
    Fine,
}

fn parse_color(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got {s:?}"));
    };
    let channel = |c: &str| {
        c.parse::<u8>()
            .map_err(|e| format!("bad colour channel {c:?}: {e}"))
    };
    Ok([channel(*r)?, channel(*g)?, channel(*b)?])
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        blur_kernel_size: cli.blur_kernel_size,
        blur_sigma: cli.blur_sigma,
        canny_low: cli.canny_low,
        canny_high: cli.canny_high,
        gradient_norm: match cli.gradient_norm {
            Norm::L1 => GradientNorm::L1,
            Norm::L2 => GradientNorm::L2,
        },
        hough: hough_params(cli),
        line_color: cli.line_color,
        line_thickness: cli.line_thickness,
    })
}

fn hough_params(cli: &Cli) -> HoughParams {
    let params = HoughParams {
        rho_resolution: cli.rho,
        theta_resolution: cli.theta,
        vote_threshold: cli.vote_threshold,
        min_theta: cli.min_theta,
        max_theta: cli.max_theta,
        max_lines: cli.max_lines,
        suppress_non_maxima: cli.suppress,
    };
    match cli.theta_preset {
        None => params,
        Some(Preset::Vertical) => params.with_preset(ThetaPreset::Vertical),
        Some(Preset::Horizontal) => params.with_preset(ThetaPreset::Horizontal),
        Some(Preset::Fine) => params.with_preset(ThetaPreset::Fine),
    }
}

/// Segment detector parameters. The segment detector always sweeps every
/// direction, so it takes `--theta` rather than a preset's coarse step.
const fn segment_params(cli: &Cli, config: &PipelineConfig) -> SegmentParams {
    SegmentParams {
        rho_resolution: config.hough.rho_resolution,
        theta_resolution: cli.theta,
        vote_threshold: cli.segment_threshold,
        min_line_length: cli.min_line_length,
        max_line_gap: cli.max_line_gap,
        max_segments: None,
        seed: cli.seed,
    }
}

fn save(image: &PixelBuffer, gray: bool, path: &Path) -> Result<(), String> {
    let written = if gray {
        image.to_gray_image().save(path)
    } else {
        image.to_rgb_image().save(path)
    };
    written.map_err(|e| format!("writing {}: {e}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Run one image through the pipeline and write its outputs.
fn process_file(
    cli: &Cli,
    config: &PipelineConfig,
    input: &Path,
) -> Result<PipelineDiagnostics, String> {
    let bytes = std::fs::read(input).map_err(|e| format!("reading {}: {e}", input.display()))?;
    let image = spinefind_pipeline::decode(&bytes).map_err(|e| e.to_string())?;
    let (staged, diagnostics) =
        spinefind_pipeline::process_with_diagnostics(image, config.clone(), &StdClock)
            .map_err(|e| e.to_string())?;

    let out_dir = cli.output_dir.as_deref();
    save(
        &staged.annotated,
        false,
        &discover::output_path(input, out_dir, Output::Hough),
    )?;
    if cli.edges {
        write_edge_views(&staged, input, out_dir)?;
    }
    if cli.segments {
        let segments = spinefind_pipeline::detect_segments(
            &staged.edges,
            &segment_params(cli, config),
        )
        .map_err(|e| e.to_string())?;
        log::info!("{}: {} segments", input.display(), segments.len());
        let drawn = spinefind_pipeline::render_segments(
            &staged.original,
            &segments,
            config.line_color,
            config.line_thickness,
        )
        .map_err(|e| e.to_string())?;
        save(
            &drawn,
            false,
            &discover::output_path(input, out_dir, Output::Segments),
        )?;
    }
    Ok(diagnostics)
}

fn write_edge_views(
    staged: &StagedResult,
    input: &Path,
    out_dir: Option<&Path>,
) -> Result<(), String> {
    save(
        &staged.edges,
        true,
        &discover::output_path(input, out_dir, Output::Edges),
    )?;
    let overlay = spinefind_pipeline::overlay_edges(&staged.original, &staged.edges);
    save(
        &overlay,
        false,
        &discover::output_path(input, out_dir, Output::Overlay),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("config: {config:?}");

    let inputs = match discover::list_images(&cli.dir) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.dir.display());
            return ExitCode::FAILURE;
        }
    };
    if inputs.is_empty() {
        log::warn!("no images found in {}", cli.dir.display());
    }
    if let Some(ref dir) = cli.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Error creating {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    let mut failures = 0usize;
    for input in &inputs {
        match process_file(&cli, &config, input) {
            Ok(diagnostics) => {
                log::info!(
                    "{}: {} lines in {:.1}ms",
                    input.display(),
                    diagnostics.summary.line_count,
                    diagnostics.total_duration.as_secs_f64() * 1000.0,
                );
                if cli.json {
                    let record = serde_json::json!({
                        "file": input.display().to_string(),
                        "diagnostics": diagnostics,
                    });
                    match serde_json::to_string_pretty(&record) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            failures += 1;
                        }
                    }
                } else {
                    println!("{}\n{}\n", input.display(), diagnostics.report());
                }
            }
            Err(msg) => {
                log::warn!("{}: {msg}", input.display());
                failures += 1;
            }
        }
    }

    log::info!(
        "processed {} images, {failures} failed",
        inputs.len(),
    );
    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Standard-library clock for native builds.
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("spinefind").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_pipeline_config() {
        let cli = parse(&[]);
        assert_eq!(cli.dir, PathBuf::from("."));
        assert_eq!(config_from_cli(&cli).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn flags_reach_the_config() {
        let cli = parse(&[
            "shelves",
            "--vote-threshold",
            "90",
            "--gradient-norm",
            "l1",
            "--line-color",
            "0, 255, 0",
            "--max-lines",
            "12",
            "--suppress",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(cli.dir, PathBuf::from("shelves"));
        assert_eq!(config.hough.vote_threshold, 90);
        assert_eq!(config.gradient_norm, GradientNorm::L1);
        assert_eq!(config.line_color, [0, 255, 0]);
        assert_eq!(config.hough.max_lines, Some(12));
        assert!(config.hough.suppress_non_maxima);
    }

    #[test]
    fn theta_preset_overrides_theta_and_window() {
        let cli = parse(&["--theta", "0.5", "--theta-preset", "horizontal"]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.hough.theta_resolution - std::f64::consts::PI).abs() < 1e-12);
        assert!(config.hough.min_theta.abs() < f64::EPSILON);
        assert!(config.hough.max_theta.abs() < f64::EPSILON);

        let cli = parse(&["--theta-preset", "vertical"]);
        let hough = config_from_cli(&cli).unwrap().hough;
        assert!((hough.min_theta - std::f64::consts::FRAC_PI_2).abs() < f64::EPSILON);
        assert!((hough.max_theta - std::f64::consts::FRAC_PI_2).abs() < f64::EPSILON);
        // Segments keep sweeping at the plain angle step.
        let segments = segment_params(&cli, &config_from_cli(&cli).unwrap());
        assert!((segments.theta_resolution - HoughParams::DEFAULT_THETA_RESOLUTION).abs() < 1e-12);
    }

    #[test]
    fn config_json_overrides_flags() {
        let json = serde_json::to_string(&PipelineConfig {
            line_thickness: 5,
            ..PipelineConfig::default()
        })
        .unwrap();
        let cli = parse(&["--line-thickness", "1", "--config-json", &json]);
        assert_eq!(config_from_cli(&cli).unwrap().line_thickness, 5);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = parse(&["--config-json", "{not json"]);
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.contains("--config-json"));
    }

    #[test]
    fn colour_parsing() {
        assert_eq!(parse_color("1,2,3").unwrap(), [1, 2, 3]);
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,2,300").is_err());
    }

    #[test]
    fn segment_params_share_resolutions() {
        let cli = parse(&["--rho", "2", "--seed", "7"]);
        let config = config_from_cli(&cli).unwrap();
        let params = segment_params(&cli, &config);
        assert!((params.rho_resolution - 2.0).abs() < f64::EPSILON);
        assert_eq!(params.seed, 7);
        assert_eq!(params.vote_threshold, SegmentParams::DEFAULT_VOTE_THRESHOLD);
    }
}
