//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use pngforge_core::{BatchConverter, RasterPipeline, TraceOptions, VectorPipeline};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived). Directory paths are absolute.
    pub config: Arc<Config>,
    /// PNG → SVG batches.
    pub vector: BatchConverter,
    /// PNG → WebP batches.
    pub raster: BatchConverter,
}

impl AppState {
    /// Create the upload and output directories if needed and wire the
    /// converters to them.
    pub fn new(mut config: Config) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.upload_dir)?;
        std::fs::create_dir_all(&config.output_dir)?;
        // Reported output paths are built from these, so make them absolute.
        config.upload_dir = std::fs::canonicalize(&config.upload_dir)?;
        config.output_dir = std::fs::canonicalize(&config.output_dir)?;

        let trace = TraceOptions {
            mode: config.trace_mode,
            ..TraceOptions::default()
        };
        let vector = BatchConverter::new(&config.output_dir, Arc::new(VectorPipeline::new(trace)));
        let raster = BatchConverter::new(&config.output_dir, Arc::new(RasterPipeline::new()));

        Ok(Self {
            config: Arc::new(config),
            vector,
            raster,
        })
    }
}
