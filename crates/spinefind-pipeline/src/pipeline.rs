//! Typestate pipeline: one call per stage, with the intermediate of every
//! stage available in between.
//!
//! [`crate::process`] runs everything at once; [`Pipeline`] hands control
//! back after each step:
//!
//! ```rust
//! # use spinefind_pipeline::{Pipeline, PipelineConfig, PipelineError, PixelBuffer};
//! # fn run(image: PixelBuffer) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(image, PipelineConfig::default())
//!     .blur()?
//!     .detect_edges()?
//!     .detect_lines()?
//!     .render()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! A transition takes the current state by value and yields the next one
//! together with everything computed so far. Parameters are checked when
//! their stage runs.
//!
//! # Memory
//!
//! Every stage retains the rasters computed before it. For a 12
//! megapixel photo that is roughly 36 MB per RGB buffer until
//! [`Rendered::into_result`] hands them over. Callers that only need the
//! lines and the annotated image should prefer [`crate::process`].

use crate::diagnostics::StageMetrics;
use crate::types::{
    DetectedLine, Dimensions, PipelineConfig, PipelineError, PixelBuffer, StagedResult,
};

/// Input and config, nothing computed yet.
#[must_use = "a pending pipeline does nothing until .blur() is called"]
pub struct Pending {
    config: PipelineConfig,
    original: PixelBuffer,
}

impl Pending {
    /// The input image.
    #[must_use]
    pub const fn original(&self) -> &PixelBuffer {
        &self.original
    }

    /// The configuration the pipeline will run with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Blur the input and advance to the [`Blurred`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for an even or zero
    /// kernel size or a non-positive sigma.
    pub fn blur(self) -> Result<Blurred, PipelineError> {
        let blurred = crate::blur::gaussian_blur(
            &self.original,
            self.config.blur_kernel_size,
            self.config.blur_sigma,
        )?;
        Ok(Blurred {
            config: self.config,
            original: self.original,
            blurred,
        })
    }
}

/// Blur done.
#[must_use = "continue with .detect_edges()"]
pub struct Blurred {
    config: PipelineConfig,
    original: PixelBuffer,
    blurred: PixelBuffer,
}

impl Blurred {
    /// The blurred image.
    #[must_use]
    pub const fn blurred(&self) -> &PixelBuffer {
        &self.blurred
    }

    /// Run Canny and advance to the [`EdgesDetected`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the Canny
    /// thresholds are out of order or negative.
    pub fn detect_edges(self) -> Result<EdgesDetected, PipelineError> {
        let edges = crate::edge::detect_edges_with(&self.blurred, &self.config.canny_params())?;
        Ok(EdgesDetected {
            config: self.config,
            original: self.original,
            blurred: self.blurred,
            edges,
        })
    }
}

/// Canny done.
#[must_use = "continue with .detect_lines()"]
pub struct EdgesDetected {
    config: PipelineConfig,
    original: PixelBuffer,
    blurred: PixelBuffer,
    edges: PixelBuffer,
}

impl EdgesDetected {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &PixelBuffer {
        &self.edges
    }

    /// Run the Hough transform and advance to [`LinesDetected`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the Hough
    /// parameters fail validation.
    pub fn detect_lines(self) -> Result<LinesDetected, PipelineError> {
        let lines = crate::hough::detect_lines(&self.edges, &self.config.hough)?;
        Ok(LinesDetected {
            config: self.config,
            original: self.original,
            blurred: self.blurred,
            edges: self.edges,
            lines,
        })
    }
}

/// Hough done.
#[must_use = "continue with .render()"]
pub struct LinesDetected {
    config: PipelineConfig,
    original: PixelBuffer,
    blurred: PixelBuffer,
    edges: PixelBuffer,
    lines: Vec<DetectedLine>,
}

impl LinesDetected {
    /// Lines found inside the window, strongest first.
    #[must_use]
    pub fn lines(&self) -> &[DetectedLine] {
        &self.lines
    }

    /// Draw the lines onto the input and advance to [`Rendered`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the configured
    /// line thickness is zero.
    pub fn render(self) -> Result<Rendered, PipelineError> {
        let annotated = crate::render::render_lines(
            &self.original,
            &self.lines,
            self.config.line_color,
            self.config.line_thickness,
        )?;
        Ok(Rendered {
            config: self.config,
            original: self.original,
            blurred: self.blurred,
            edges: self.edges,
            lines: self.lines,
            annotated,
        })
    }
}

/// Lines drawn onto a colour copy of the input. Holds every raster
/// computed on the way (see [Memory](self#memory)).
#[must_use = "take the intermediates with .into_result()"]
pub struct Rendered {
    config: PipelineConfig,
    original: PixelBuffer,
    blurred: PixelBuffer,
    edges: PixelBuffer,
    lines: Vec<DetectedLine>,
    annotated: PixelBuffer,
}

impl Rendered {
    /// The annotated image.
    #[must_use]
    pub const fn annotated(&self) -> &PixelBuffer {
        &self.annotated
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.original.dimensions()
    }

    /// Hand over every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = self.dimensions();
        StagedResult {
            original: self.original,
            blurred: self.blurred,
            edges: self.edges,
            lines: self.lines,
            annotated: self.annotated,
            dimensions,
        }
    }
}

/// Number of [`Stage`] variants, `Pending` included.
pub const STAGE_COUNT: usize = 5;

/// Borrowed view of what a stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// The unprocessed input image.
    Source {
        /// The input image.
        original: &'a PixelBuffer,
    },
    /// Gaussian blur result.
    Blurred {
        /// The blurred image.
        blurred: &'a PixelBuffer,
    },
    /// Edge detection result.
    EdgesDetected {
        /// The binary edge map.
        edges: &'a PixelBuffer,
    },
    /// Line detection result.
    LinesDetected {
        /// The detected lines.
        lines: &'a [DetectedLine],
    },
    /// Rendering result.
    Rendered {
        /// The annotated image.
        annotated: &'a PixelBuffer,
        /// Image dimensions.
        dimensions: Dimensions,
    },
}

/// Common interface of the stage types, used to drive the pipeline in a
/// loop:
///
/// ```rust
/// # use spinefind_pipeline::{Pipeline, PipelineConfig, PipelineError, PixelBuffer};
/// # use spinefind_pipeline::pipeline::{Stage, Advance};
/// # fn run(image: PixelBuffer) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(image, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Short lowercase name, e.g. `"edges"`.
    const NAME: &str;

    /// Position in the pipeline, starting at 0.
    const INDEX: usize;

    /// What this stage computed.
    fn output(&self) -> StageOutput<'_>;

    /// Metrics describing the work done to reach this stage, `None` for
    /// [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage, or `Ok(None)` at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the next stage
    /// rejects its configured parameters.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages and return the final [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Blurred(self.blur()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.blur()?.complete()
    }
}

impl PipelineStage for Blurred {
    const NAME: &str = "blur";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Blurred {
            blurred: &self.blurred,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Blur {
            kernel_size: self.config.blur_kernel_size,
            sigma: self.config.blur_sigma,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::EdgesDetected(self.detect_edges()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.detect_edges()?.complete()
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &str = "edges";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::EdgesDetected { edges: &self.edges }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let d = self.edges.dimensions();
        Some(StageMetrics::EdgeDetection {
            low_threshold: self.config.canny_low,
            high_threshold: self.config.canny_high,
            edge_pixel_count: self.edges.count_nonzero(),
            total_pixel_count: u64::from(d.width) * u64::from(d.height),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::LinesDetected(self.detect_lines()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.detect_lines()?.complete()
    }
}

impl PipelineStage for LinesDetected {
    const NAME: &str = "lines";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::LinesDetected { lines: &self.lines }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::LineDetection {
            vote_threshold: self.config.hough.vote_threshold,
            min_theta: self.config.hough.min_theta,
            max_theta: self.config.hough.max_theta,
            line_count: self.lines.len(),
            strongest_votes: self.lines.first().map_or(0, |l| l.votes),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Rendered(self.render()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.render()?.into_result())
    }
}

impl PipelineStage for Rendered {
    const NAME: &str = "render";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Rendered {
            annotated: &self.annotated,
            dimensions: self.dimensions(),
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Render {
            line_count: self.lines.len(),
            thickness: self.config.line_thickness,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Any one of the stage types.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Blurred`].
    Blurred(Blurred),
    /// See [`EdgesDetected`].
    EdgesDetected(EdgesDetected),
    /// See [`LinesDetected`].
    LinesDetected(LinesDetected),
    /// See [`Rendered`].
    Rendered(Rendered),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match until
/// [`STAGE_COUNT`] is revisited.
#[allow(dead_code)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Blurred(_)
        | Stage::EdgesDetected(_)
        | Stage::LinesDetected(_)
        | Stage::Rendered(_) => {}
    }
}

/// Outcome of [`Stage::advance`].
#[must_use]
pub enum Advance {
    /// Moved one stage forward.
    Next(Stage),
    /// Already rendered; returned as is.
    Complete(Stage),
}

/// Forward a call to the wrapped stage.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Blurred(s) => s.$method($($arg),*),
            Self::EdgesDetected(s) => s.$method($($arg),*),
            Self::LinesDetected(s) => s.$method($($arg),*),
            Self::Rendered(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// See [`PipelineStage::NAME`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// See [`PipelineStage::INDEX`].
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// See [`PipelineStage::output`].
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// See [`PipelineStage::metrics`].
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// True once rendered.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }

    /// Advance to the next stage; `Ok(None)` once complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Like [`Stage::next`], but a rendered stage comes back as
    /// [`Advance::Complete`] instead of `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    #[allow(clippy::unreachable)]
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run whatever is left.
    ///
    /// # Errors
    ///
    /// The first stage error.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// `PipelineStage`'s associated constants are not reachable as `self.NAME`,
// so the macro goes through this helper.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Blurred> for Stage {
    fn from(s: Blurred) -> Self {
        Self::Blurred(s)
    }
}

impl From<EdgesDetected> for Stage {
    fn from(s: EdgesDetected) -> Self {
        Self::EdgesDetected(s)
    }
}

impl From<LinesDetected> for Stage {
    fn from(s: LinesDetected) -> Self {
        Self::LinesDetected(s)
    }
}

impl From<Rendered> for Stage {
    fn from(s: Rendered) -> Self {
        Self::Rendered(s)
    }
}

/// Entry point of the typestate chain. Stages can only be called in
/// order because each one exists only as the output of the previous.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline. Nothing runs until [`Pending::blur`].
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image: PixelBuffer, config: PipelineConfig) -> Pending {
        Pending {
            config,
            original: image,
        }
    }
}
