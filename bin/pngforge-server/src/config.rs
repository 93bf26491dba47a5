//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

use pngforge_core::{AggregationPolicy, TraceMode};

/// Runtime configuration for pngforge-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:3001"`).
    pub bind_address: String,

    /// Where raw uploads are spooled before conversion (default: `"uploads"`).
    pub upload_dir: PathBuf,

    /// Where converted artifacts are written (default: `"output"`).
    pub output_dir: PathBuf,

    /// Maximum number of `images` parts accepted per request.
    pub max_files: usize,

    /// Request body limit in MiB, covering all files of one request.
    pub max_upload_size_mb: usize,

    /// Whether one failing file fails the whole batch.
    pub aggregation: AggregationPolicy,

    /// Keep spooled uploads on disk after conversion.
    pub keep_uploads: bool,

    /// Vectorizer mode for `/convert-png-to-svg`.
    pub trace_mode: TraceMode,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Optional directory for daily-rolling log files, in addition to stdout.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3001".into(),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            max_files: 30,
            max_upload_size_mb: 100,
            aggregation: AggregationPolicy::AllOrNothing,
            keep_uploads: false,
            trace_mode: TraceMode::Binary,
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        let partial = env_bool("PNGFORGE_PARTIAL_RESULTS", false);
        Self {
            bind_address: env_or("PNGFORGE_BIND", &d.bind_address),
            upload_dir: env_path("PNGFORGE_UPLOAD_DIR").unwrap_or(d.upload_dir),
            output_dir: env_path("PNGFORGE_OUTPUT_DIR").unwrap_or(d.output_dir),
            max_files: parse_env("PNGFORGE_MAX_FILES", d.max_files),
            max_upload_size_mb: parse_env("PNGFORGE_MAX_UPLOAD_SIZE_MB", d.max_upload_size_mb),
            aggregation: if partial {
                AggregationPolicy::Partial
            } else {
                AggregationPolicy::AllOrNothing
            },
            keep_uploads: env_bool("PNGFORGE_KEEP_UPLOADS", d.keep_uploads),
            trace_mode: parse_env("PNGFORGE_TRACE_MODE", d.trace_mode),
            log_level: env_or("PNGFORGE_LOG", &d.log_level),
            log_json: env_bool("PNGFORGE_LOG_JSON", d.log_json),
            log_dir: env_path("PNGFORGE_LOG_DIR"),
            cors_allowed_origins: std::env::var("PNGFORGE_CORS_ORIGINS").ok(),
            enable_swagger: env_bool("PNGFORGE_ENABLE_SWAGGER", d.enable_swagger),
        }
    }

    /// Request body limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
