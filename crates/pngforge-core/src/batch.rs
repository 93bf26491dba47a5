//! Concurrent batch conversion.
//!
//! Every file of a batch becomes an independent task: read the upload, run
//! the [`Pipeline`] on tokio's blocking pool, write the artifact. Tasks are
//! joined positionally so results always follow input order, whatever the
//! completion order was.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::error::ConvertError;
use crate::naming::derive_output_name;
use crate::pipeline::{ConversionKind, Pipeline};

/// An upload spooled to disk, waiting to be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Temporary location of the raw bytes.
    pub path: PathBuf,
    /// Filename as sent by the client.
    pub original_name: String,
}

/// A successfully written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    /// Derived output filename.
    pub filename: String,
    /// Where the artifact was written.
    pub output_path: PathBuf,
}

/// How per-file outcomes are folded into one batch outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AggregationPolicy {
    /// Any failure fails the whole batch and no results are reported.
    #[default]
    AllOrNothing,
    /// Each file reports its own outcome.
    Partial,
}

/// Runs one [`Pipeline`] over batches of uploads, writing into `output_dir`.
#[derive(Clone)]
pub struct BatchConverter {
    output_dir: PathBuf,
    pipeline: Arc<dyn Pipeline>,
}

impl std::fmt::Debug for BatchConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchConverter")
            .field("output_dir", &self.output_dir)
            .field("kind", &self.pipeline.kind())
            .finish()
    }
}

impl BatchConverter {
    pub fn new(output_dir: impl Into<PathBuf>, pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pipeline,
        }
    }

    pub fn kind(&self) -> ConversionKind {
        self.pipeline.kind()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Convert every file; fail the batch on the first error.
    ///
    /// On failure no results are returned, even for files that were already
    /// written. Blocking work that has started keeps running in the
    /// background.
    pub async fn convert_all(
        &self,
        files: &[UploadedFile],
    ) -> Result<Vec<ConversionResult>, ConvertError> {
        let started = Instant::now();
        let results = try_join_all(files.iter().map(|file| self.convert_one(file)))
            .await
            .inspect_err(|e| {
                warn!(kind = %self.kind(), files = files.len(), error = %e, "batch failed");
            })?;

        info!(
            kind = %self.kind(),
            files = results.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "batch converted"
        );
        Ok(results)
    }

    /// Convert every file and report each outcome in input order.
    pub async fn convert_each(
        &self,
        files: &[UploadedFile],
    ) -> Vec<Result<ConversionResult, ConvertError>> {
        let started = Instant::now();
        let outcomes = join_all(files.iter().map(|file| self.convert_one(file))).await;

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!(
            kind = %self.kind(),
            files = outcomes.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis(),
            "batch converted"
        );
        outcomes
    }

    async fn convert_one(&self, file: &UploadedFile) -> Result<ConversionResult, ConvertError> {
        let kind = self.kind();
        let original = file.original_name.as_str();

        let filename =
            derive_output_name(original, kind).map_err(|source| ConvertError::InvalidName {
                filename: original.to_owned(),
                source,
            })?;

        let input = tokio::fs::read(&file.path).await.map_err(|source| ConvertError::Read {
            filename: original.to_owned(),
            source,
        })?;

        let pipeline = Arc::clone(&self.pipeline);
        let input_len = input.len();
        let output = tokio::task::spawn_blocking(move || pipeline.convert(&input))
            .await
            .map_err(|source| ConvertError::Aborted {
                filename: original.to_owned(),
                source,
            })?
            .map_err(|source| {
                debug!(file = %original, error = %source, "pipeline failed");
                ConvertError::from_pipeline(kind, original, source)
            })?;

        let output_path = self.output_dir.join(&filename);
        tokio::fs::write(&output_path, &output)
            .await
            .map_err(|source| ConvertError::Write {
                filename: original.to_owned(),
                kind,
                source,
            })?;

        debug!(
            file = %original,
            output = %output_path.display(),
            input_bytes = input_len,
            output_bytes = output.len(),
            "file converted"
        );
        Ok(ConversionResult { filename, output_path })
    }
}
