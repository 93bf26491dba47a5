//! Multipart upload spooling.
//!
//! Every file part named [`IMAGES_FIELD`] is streamed to the upload
//! directory under a random name. The resulting [`SpooledBatch`] owns those
//! files; call [`SpooledBatch::cleanup`] once conversion is done.

use std::path::Path;

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use pngforge_core::UploadedFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ServerError;

/// Multipart field name carrying the images.
pub const IMAGES_FIELD: &str = "images";

/// Uploads of one request, spooled to disk.
#[derive(Debug, Default)]
pub struct SpooledBatch {
    files: Vec<UploadedFile>,
}

impl SpooledBatch {
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Delete the spooled files. Failures are logged, not returned.
    pub async fn cleanup(self) {
        for file in &self.files {
            if let Err(e) = tokio::fs::remove_file(&file.path).await {
                warn!(path = %file.path.display(), error = %e, "failed to remove spooled upload");
            }
        }
    }
}

/// Read every part of `multipart`, spooling image files into `upload_dir`.
///
/// Text fields are ignored. A file under any other field name, or more than
/// `max_files` images, rejects the request; files spooled so far are removed
/// before the error is returned.
pub async fn spool(
    multipart: &mut Multipart,
    upload_dir: &Path,
    max_files: usize,
) -> Result<SpooledBatch, ServerError> {
    let mut batch = SpooledBatch::default();
    match spool_into(&mut batch, multipart, upload_dir, max_files).await {
        Ok(()) => Ok(batch),
        Err(e) => {
            batch.cleanup().await;
            Err(e)
        }
    }
}

async fn spool_into(
    batch: &mut SpooledBatch,
    multipart: &mut Multipart,
    upload_dir: &Path,
    max_files: usize,
) -> Result<(), ServerError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_owned();
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            debug!(field = %field_name, "ignoring non-file field");
            continue;
        };

        if field_name != IMAGES_FIELD {
            return Err(ServerError::BadRequest(format!("Unexpected field: {field_name}")));
        }
        // Browsers send an empty, unnamed part when no file was picked.
        if original_name.is_empty() {
            continue;
        }
        if batch.len() >= max_files {
            return Err(ServerError::BadRequest(format!(
                "Too many files: at most {max_files} allowed."
            )));
        }

        let path = upload_dir.join(Uuid::new_v4().to_string());
        // Register before writing so a failed write is still cleaned up.
        batch.files.push(UploadedFile {
            path: path.clone(),
            original_name,
        });
        let size = write_field(field, &path).await?;

        debug!(
            file_name = %batch.files[batch.len() - 1].original_name,
            path = %path.display(),
            size_bytes = size,
            "spooled upload"
        );
    }
    Ok(())
}

async fn write_field(mut field: Field<'_>, path: &Path) -> Result<u64, ServerError> {
    let io_err = |e: std::io::Error| {
        ServerError::Internal(format!("failed to spool upload to {}: {e}", path.display()))
    };

    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await.map_err(io_err)?;
        size += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(size)
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::BadRequest(format!("Failed to read multipart field: {}", e.body_text()))
    }
}
