//! pngforge-core – batch raster conversion.
//!
//! The crate knows nothing about HTTP. It exposes:
//! - [`pipeline`]: pure `bytes -> bytes` conversions (trace to SVG, re-encode to WebP).
//! - [`naming`]: output filename derivation.
//! - [`batch`]: a concurrent runner that reads uploads, converts them on the
//!   blocking pool and writes the artifacts, with all-or-nothing or per-file
//!   aggregation.

pub mod batch;
pub mod error;
pub mod naming;
pub mod pipeline;

pub use batch::{AggregationPolicy, BatchConverter, ConversionResult, UploadedFile};
pub use error::{ConvertError, NamingError, PipelineError};
pub use naming::derive_output_name;
pub use pipeline::{
    ConversionKind, Pipeline, RasterPipeline, TraceMode, TraceOptions, VectorPipeline,
};
