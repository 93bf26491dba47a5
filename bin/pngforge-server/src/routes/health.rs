//! Readiness endpoint: can this instance accept and store conversions?

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Report whether the upload and output directories are usable.
///
/// Each directory must exist and accept a new file. Returns 200 with
/// `"status": "ok"` when both do, 503 with `"status": "degraded"` otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Both directories are writable", body = Value),
        (status = 503, description = "A working directory is missing or read-only", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let upload = dir_is_writable(&state.config.upload_dir).await;
    let output = dir_is_writable(&state.config.output_dir).await;

    let (status, label) = if upload && output {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = json!({
        "status": label,
        "version": env!("CARGO_PKG_VERSION"),
        "directories": {
            "upload": upload,
            "output": output,
        },
    });
    (status, Json(body))
}

/// Create and remove a scratch file in `dir`.
async fn dir_is_writable(dir: &Path) -> bool {
    let scratch = dir.join(format!(".pngforge-health-{}", Uuid::new_v4()));
    match tokio::fs::write(&scratch, b"").await {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(&scratch).await {
                warn!(path = %scratch.display(), error = %e, "failed to remove health check file");
            }
            true
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "directory is not writable");
            false
        }
    }
}
