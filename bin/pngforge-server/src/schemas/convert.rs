use pngforge_core::{ConversionResult, ConvertError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const SUCCESS_MESSAGE: &str = "Files converted and saved successfully.";
pub const PARTIAL_MESSAGE: &str = "Some files could not be converted.";

/// Multipart body accepted by the conversion endpoints.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ConvertUpload {
    /// One to thirty image files (repeat the `images` field).
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
}

/// One written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedFile {
    /// Output filename (upload name with the extension swapped).
    pub filename: String,
    /// Absolute path of the artifact on the server.
    pub output_path: String,
}

impl From<ConversionResult> for ConvertedFile {
    fn from(r: ConversionResult) -> Self {
        Self {
            filename: r.filename,
            output_path: r.output_path.to_string_lossy().into_owned(),
        }
    }
}

/// A file that could not be converted (partial-results mode only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailedFile {
    /// Upload name as sent by the client.
    pub filename: String,
    /// Human-readable reason.
    pub error: String,
}

impl From<&ConvertError> for FailedFile {
    fn from(e: &ConvertError) -> Self {
        Self {
            filename: e.filename().to_owned(),
            error: e.to_string(),
        }
    }
}

/// Response body of `POST /convert-png-to-svg` and `POST /convert-png-to-webp`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    pub message: String,
    /// Converted files, in upload order.
    pub files: Vec<ConvertedFile>,
    /// Files that failed; omitted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedFile>,
}
