//! Shared types for the spinefind image processing pipeline.

use serde::{Deserialize, Serialize};

use crate::edge::{CannyParams, GradientNorm};
use crate::hough::{HoughParams, THETA_ORIGIN_OFFSET};

/// Re-export `GrayImage` so downstream crates can convert edge maps
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can encode annotated
/// output without depending on `image` directly.
pub use image::RgbImage;

/// Distance, in pixels, that [`DetectedLine::endpoints`] projects along
/// the line direction from the foot of the perpendicular. Large enough
/// for the segment to span any realistic photograph.
pub const LINE_HALF_LENGTH: f64 = 10_000.0;

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    /// One sample per pixel.
    Gray,
    /// Three interleaved samples per pixel, in R, G, B order.
    Rgb,
}

impl Channels {
    /// Number of samples per pixel.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

/// An owned, row-major grid of 8-bit samples.
///
/// Samples are stored interleaved in a single flat vector; the sample for
/// channel `c` of pixel `(x, y)` lives at `(y * width + x) * channels + c`.
/// The length of the vector always equals `width * height * channels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PixelBufferRepr", into = "PixelBufferRepr")]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
}

/// Unchecked serde form of [`PixelBuffer`]; validated on the way in.
#[derive(Serialize, Deserialize)]
struct PixelBufferRepr {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
}

impl TryFrom<PixelBufferRepr> for PixelBuffer {
    type Error = PipelineError;

    fn try_from(repr: PixelBufferRepr) -> Result<Self, Self::Error> {
        Self::new(repr.width, repr.height, repr.channels, repr.data)
    }
}

impl From<PixelBuffer> for PixelBufferRepr {
    fn from(buffer: PixelBuffer) -> Self {
        Self {
            width: buffer.width,
            height: buffer.height,
            channels: buffer.channels,
            data: buffer.data,
        }
    }
}

impl PixelBuffer {
    /// Wrap raw samples.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if `data.len()` is not
    /// `width * height * channels`.
    pub fn new(
        width: u32,
        height: u32,
        channels: Channels,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        let expected = sample_count(width, height, channels);
        if data.len() != expected {
            return Err(PipelineError::InvalidParameter(format!(
                "buffer of {width}x{height}x{} needs {expected} samples, got {}",
                channels.count(),
                data.len(),
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A buffer with every sample set to `value`.
    #[must_use]
    pub fn filled(width: u32, height: u32, channels: Channels, value: u8) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![value; sample_count(width, height, channels)],
        }
    }

    /// A single-channel buffer built from a per-pixel function.
    #[must_use]
    pub fn gray_from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut data = Vec::with_capacity(sample_count(width, height, Channels::Gray));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            channels: Channels::Gray,
            data,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// Width and height as a [`Dimensions`].
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// `true` if the buffer holds no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// All samples, row-major and interleaved.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its samples.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The samples of pixel `(x, y)`, one per channel.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the buffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} buffer",
            self.width,
            self.height,
        );
        let n = self.channels.count();
        let start = self.offset(x, y);
        &self.data[start..start + n]
    }

    /// Number of pixels with at least one nonzero sample.
    #[must_use]
    pub fn count_nonzero(&self) -> u64 {
        self.data
            .chunks_exact(self.channels.count())
            .map(|px| u64::from(px.iter().any(|&s| s != 0)))
            .sum()
    }

    /// Extract channel `c` as a grayscale image.
    ///
    /// # Panics
    ///
    /// Panics if `c` is not a valid channel index.
    #[must_use]
    pub fn channel_plane(&self, c: usize) -> GrayImage {
        let n = self.channels.count();
        assert!(c < n, "channel {c} out of range for {n}-channel buffer");
        let plane: Vec<u8> = self.data.iter().skip(c).step_by(n).copied().collect();
        // Length is width * height by construction.
        GrayImage::from_raw(self.width, self.height, plane)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// A 3-channel copy; grayscale samples are replicated across R, G, B.
    #[must_use]
    pub fn to_rgb(&self) -> Self {
        match self.channels {
            Channels::Rgb => self.clone(),
            Channels::Gray => Self {
                width: self.width,
                height: self.height,
                channels: Channels::Rgb,
                data: self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            },
        }
    }

    /// Convert to an `image` RGB buffer (grayscale is replicated).
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        let rgb = self.to_rgb();
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Convert to an `image` grayscale buffer.
    ///
    /// RGB buffers are reduced with the `image` crate's luminance weights.
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        match self.channels {
            Channels::Gray => self.channel_plane(0),
            Channels::Rgb => image::DynamicImage::ImageRgb8(self.to_rgb_image()).to_luma8(),
        }
    }

    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels.count()
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: Channels::Gray,
            data: image.into_raw(),
        }
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: Channels::Rgb,
            data: image.into_raw(),
        }
    }
}

const fn sample_count(width: u32, height: u32, channels: Channels) -> usize {
    width as usize * height as usize * channels.count()
}

/// Position in image coordinates, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Column, in pixels.
    pub x: f64,
    /// Vertical position (pixels from top edge, growing downward).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// An infinite straight line found by the Hough transform.
///
/// Expressed in the same angular frame as the detection window:
/// `theta` is the angle of the line's direction, measured from the +x
/// axis toward +y (downward), and `rho` is the signed distance from the
/// origin along the unit normal `(sin theta, -cos theta)`. A vertical
/// line `x = 50` therefore reads `theta = pi/2`, `rho = 50`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedLine {
    /// Signed perpendicular distance from the origin, in pixels.
    pub rho: f64,
    /// Direction angle in radians.
    pub theta: f64,
    /// Accumulator votes behind this line.
    pub votes: u32,
}

impl DetectedLine {
    /// Angle of the line normal in the accumulator's polar frame
    /// (`x cos a + y sin a = -rho`).
    #[must_use]
    pub fn normal_angle(&self) -> f64 {
        self.theta + THETA_ORIGIN_OFFSET
    }

    /// Foot of the perpendicular from the origin to the line.
    #[must_use]
    pub fn foot(&self) -> Point {
        let (sin, cos) = self.theta.sin_cos();
        Point::new(self.rho * sin, -self.rho * cos)
    }

    /// Two points [`LINE_HALF_LENGTH`] either side of [`foot`](Self::foot),
    /// far enough apart to span the image.
    #[must_use]
    pub fn endpoints(&self) -> (Point, Point) {
        let foot = self.foot();
        let (sin, cos) = self.theta.sin_cos();
        (
            Point::new(
                LINE_HALF_LENGTH.mul_add(cos, foot.x),
                LINE_HALF_LENGTH.mul_add(sin, foot.y),
            ),
            Point::new(
                (-LINE_HALF_LENGTH).mul_add(cos, foot.x),
                (-LINE_HALF_LENGTH).mul_add(sin, foot.y),
            ),
        )
    }
}

/// A finite line segment found by the probabilistic Hough variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    /// First end of the segment.
    pub start: Point,
    /// Second end of the segment.
    pub end: Point,
}

impl LineSegment {
    /// Euclidean length in pixels.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// Configuration for the spine-boundary pipeline.
///
/// Defaults reproduce the parameters that worked best on shelf photos:
/// a 7x7 blur at sigma 1.3, Canny thresholds 60/80 with the L2 gradient
/// norm, and a 1 px / 1 degree Hough transform restricted to directions
/// between 60 and 120 degrees (near-vertical spines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Side length of the square Gaussian kernel. Must be odd.
    pub blur_kernel_size: u32,

    /// Gaussian standard deviation in pixels.
    pub blur_sigma: f32,

    /// Canny low threshold: magnitudes below are never edges.
    pub canny_low: f32,

    /// Canny high threshold: magnitudes at or above are always edges.
    pub canny_high: f32,

    /// How gradient magnitude is computed.
    pub gradient_norm: GradientNorm,

    /// Hough transform parameters, including the angular window.
    pub hough: HoughParams,

    /// RGB colour used to draw detected lines.
    pub line_color: [u8; 3],

    /// Stroke width of drawn lines in pixels.
    pub line_thickness: u32,
}

impl PipelineConfig {
    /// Default Gaussian kernel size.
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 7;
    /// Default Gaussian sigma.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.3;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 60.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 80.0;
    /// Default line colour (red).
    pub const DEFAULT_LINE_COLOR: [u8; 3] = [255, 0, 0];
    /// Default stroke width.
    pub const DEFAULT_LINE_THICKNESS: u32 = 2;

    /// The Canny settings as a [`CannyParams`].
    #[must_use]
    pub const fn canny_params(&self) -> CannyParams {
        CannyParams {
            low_threshold: self.canny_low,
            high_threshold: self.canny_high,
            norm: self.gradient_norm,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            gradient_norm: GradientNorm::default(),
            hough: HoughParams::default(),
            line_color: Self::DEFAULT_LINE_COLOR,
            line_thickness: Self::DEFAULT_LINE_THICKNESS,
        }
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Lines found inside the angular window, strongest first.
    pub lines: Vec<DetectedLine>,

    /// Colour copy of the input with the lines drawn on it.
    pub annotated: PixelBuffer,

    /// Size of the input.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with every intermediate preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedResult {
    /// Stage 0: the input image.
    pub original: PixelBuffer,
    /// Stage 1: Gaussian-blurred image.
    pub blurred: PixelBuffer,
    /// Stage 2: binary Canny edge map.
    pub edges: PixelBuffer,
    /// Stage 3: detected lines, strongest first.
    pub lines: Vec<DetectedLine>,
    /// Stage 4: input with the lines drawn on it.
    pub annotated: PixelBuffer,
    /// Size of the input.
    pub dimensions: Dimensions,
}

/// Everything that can go wrong in the library.
///
/// Serialisable; a decode error is carried as its message only.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The bytes are not a readable PNG, JPEG or BMP.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A stage was called with parameters outside its contract.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Serde shape of [`PipelineError`].
///
/// A deserialized `ImageDecode` cannot rebuild the typed
/// `image::ImageError`; it comes back as `InvalidParameter` carrying the
/// original message.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    InvalidParameter(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::InvalidParameter(s) => PipelineErrorProxy::InvalidParameter(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidParameter(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::InvalidParameter(s) => Self::InvalidParameter(s),
        })
    }
}
