//! Conversion pipelines.
//!
//! A [`Pipeline`] is a pure, synchronous `bytes -> bytes` transformation.
//! The batch runner moves each call onto the blocking pool, so
//! implementations are free to do CPU-heavy work.

mod raster;
mod vector;

pub use raster::RasterPipeline;
pub use vector::{TraceMode, TraceOptions, VectorPipeline};

use image::DynamicImage;
use strum::{Display, EnumString};

use crate::error::PipelineError;

/// Target format of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ConversionKind {
    /// Traced vector markup.
    #[strum(serialize = "svg")]
    Vector,
    /// Re-encoded compressed raster.
    #[strum(serialize = "webp")]
    Raster,
}

impl ConversionKind {
    /// File extension (without the dot) of produced artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            ConversionKind::Vector => "svg",
            ConversionKind::Raster => "webp",
        }
    }

    /// Human-readable format name used in messages.
    pub fn label(self) -> &'static str {
        match self {
            ConversionKind::Vector => "SVG",
            ConversionKind::Raster => "WebP",
        }
    }
}

pub trait Pipeline: Send + Sync {
    /// The format this pipeline produces.
    fn kind(&self) -> ConversionKind;

    /// Convert one encoded input image into the target format.
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

/// Decode any supported raster container and reject zero-sized images.
pub(crate) fn decode(input: &[u8]) -> Result<DynamicImage, PipelineError> {
    let img = image::load_from_memory(input).map_err(PipelineError::Decode)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::EmptyImage);
    }
    Ok(img)
}
