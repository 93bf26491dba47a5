use image::{DynamicImage, Rgba, RgbaImage};
use strum::{Display, EnumString};
use tracing::trace;
use vtracer::{ColorImage, ColorMode, Config};

use super::{ConversionKind, Pipeline, decode};
use crate::error::PipelineError;

/// How the bitmap is split into shapes before path fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TraceMode {
    /// Single-colour trace of dark regions on a light background.
    #[default]
    #[strum(serialize = "binary")]
    Binary,
    /// Stacked colour layers.
    #[strum(serialize = "color")]
    Color,
}

/// Tuning knobs forwarded to the vectorizer.
#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub mode: TraceMode,
    /// Discard patches smaller than this many pixels.
    pub filter_speckle: usize,
    /// Significant bits per colour channel (color mode only).
    pub color_precision: i32,
    /// Minimum angle, in degrees, that counts as a corner.
    pub corner_threshold: i32,
    /// Decimal places kept in path coordinates.
    pub path_precision: u32,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            mode: TraceMode::Binary,
            filter_speckle: 4,
            color_precision: 6,
            corner_threshold: 60,
            path_precision: 3,
        }
    }
}

/// Raster → SVG via `vtracer`.
#[derive(Debug, Clone, Default)]
pub struct VectorPipeline {
    options: TraceOptions,
}

impl VectorPipeline {
    pub fn new(options: TraceOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TraceOptions {
        &self.options
    }

    fn config(&self) -> Config {
        let color_mode = match self.options.mode {
            TraceMode::Binary => ColorMode::Binary,
            TraceMode::Color => ColorMode::Color,
        };
        Config {
            color_mode,
            filter_speckle: self.options.filter_speckle,
            color_precision: self.options.color_precision,
            corner_threshold: self.options.corner_threshold,
            path_precision: Some(self.options.path_precision),
            ..Config::default()
        }
    }
}

impl Pipeline for VectorPipeline {
    fn kind(&self) -> ConversionKind {
        ConversionKind::Vector
    }

    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let img = decode(input)?;
        let rgba = match self.options.mode {
            TraceMode::Binary => luminance_on_white(&img),
            TraceMode::Color => img.to_rgba8(),
        };
        let (width, height) = rgba.dimensions();
        trace!(width, height, mode = %self.options.mode, "tracing bitmap");

        let bitmap = ColorImage {
            pixels: rgba.into_raw(),
            width: width as usize,
            height: height as usize,
        };
        let svg = vtracer::convert(bitmap, self.config()).map_err(PipelineError::Trace)?;
        Ok(svg.to_string().into_bytes())
    }
}

/// Composite onto white and collapse to grey.
///
/// Binary tracing thresholds a single channel, so every channel must carry
/// the same luminance and transparent areas must read as background.
fn luminance_on_white(img: &DynamicImage) -> RgbaImage {
    let mut rgba = img.to_rgba8();
    for px in rgba.pixels_mut() {
        let [r, g, b, a] = px.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        let (r, g, b) = (blend(r), blend(g), blend(b));
        let luma = ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000) as u8;
        *px = Rgba([luma, luma, luma, 255]);
    }
    rgba
}
