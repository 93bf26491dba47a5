use thiserror::Error;

use crate::pipeline::ConversionKind;

/// Errors produced by a [`Pipeline`](crate::pipeline::Pipeline) while
/// turning input bytes into output bytes.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input could not be decoded as a raster image.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The decoded image has zero width or height.
    #[error("image has no pixels")]
    EmptyImage,

    /// The vectorizer rejected the bitmap.
    #[error("failed to trace image: {0}")]
    Trace(String),

    /// The target encoder failed.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Errors returned by [`derive_output_name`](crate::naming::derive_output_name).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    /// Nothing usable was left after stripping directory components.
    #[error("filename is empty")]
    Empty,
}

/// A per-file failure inside a batch.
///
/// The `Display` output is the client-facing message, so it names the
/// failing file but never the server-side paths involved.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid filename: {filename}")]
    InvalidName {
        filename: String,
        #[source]
        source: NamingError,
    },

    #[error("Error reading upload: {filename}")]
    Read {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error processing image: {filename}")]
    Decode {
        filename: String,
        #[source]
        source: PipelineError,
    },

    #[error("Error tracing image: {filename}")]
    Trace {
        filename: String,
        #[source]
        source: PipelineError,
    },

    #[error("Error converting image: {filename}")]
    Encode {
        filename: String,
        #[source]
        source: PipelineError,
    },

    #[error("Error saving {}: {filename}", .kind.label())]
    Write {
        filename: String,
        kind: ConversionKind,
        #[source]
        source: std::io::Error,
    },

    /// The blocking conversion task panicked or was cancelled.
    #[error("Conversion task aborted: {filename}")]
    Aborted {
        filename: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ConvertError {
    /// Wrap a pipeline failure, picking the variant that matches the stage.
    ///
    /// Raster conversion is a single decode-and-encode step from the client's
    /// point of view, so every raster failure reads `Error converting image`.
    pub(crate) fn from_pipeline(
        kind: ConversionKind,
        filename: impl Into<String>,
        source: PipelineError,
    ) -> Self {
        let filename = filename.into();
        match (kind, source) {
            (ConversionKind::Raster, source) => Self::Encode { filename, source },
            (_, source @ (PipelineError::Decode(_) | PipelineError::EmptyImage)) => {
                Self::Decode { filename, source }
            }
            (_, source @ PipelineError::Trace(_)) => Self::Trace { filename, source },
            (_, source @ PipelineError::Encode(_)) => Self::Encode { filename, source },
        }
    }

    /// Original filename of the upload that failed.
    pub fn filename(&self) -> &str {
        match self {
            Self::InvalidName { filename, .. }
            | Self::Read { filename, .. }
            | Self::Decode { filename, .. }
            | Self::Trace { filename, .. }
            | Self::Encode { filename, .. }
            | Self::Write { filename, .. }
            | Self::Aborted { filename, .. } => filename,
        }
    }
}
