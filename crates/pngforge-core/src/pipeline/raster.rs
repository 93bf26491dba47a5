use std::io::Cursor;

use image::DynamicImage;
use image::codecs::webp::WebPEncoder;
use tracing::trace;

use super::{ConversionKind, Pipeline, decode};
use crate::error::PipelineError;

/// Raster → lossless WebP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterPipeline;

impl RasterPipeline {
    pub fn new() -> Self {
        Self
    }
}

impl Pipeline for RasterPipeline {
    fn kind(&self) -> ConversionKind {
        ConversionKind::Raster
    }

    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let img = decode(input)?;
        // The WebP encoder only takes 8-bit L/LA/RGB/RGBA buffers.
        let img = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };
        trace!(
            width = img.width(),
            height = img.height(),
            alpha = img.color().has_alpha(),
            "encoding webp"
        );

        let mut out = Cursor::new(Vec::new());
        img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
            .map_err(PipelineError::Encode)?;
        Ok(out.into_inner())
    }
}
