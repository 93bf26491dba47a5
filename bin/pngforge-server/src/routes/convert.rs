//! Batch conversion routes.
//!
//! Both endpoints take a multipart body with up to `PNGFORGE_MAX_FILES`
//! parts named `images`, spool them to the upload directory, convert every
//! file concurrently and answer with the written artifacts in upload order.
//!
//! With the default all-or-nothing policy one failing file fails the whole
//! request (HTTP 500, no `files`). With `PNGFORGE_PARTIAL_RESULTS=true` the
//! successful files are reported alongside a `failures` list, and only a
//! batch where every file failed is a 500.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use pngforge_core::{AggregationPolicy, BatchConverter, ConversionResult, ConvertError};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::convert::{
    ConvertResponse, ConvertUpload, ConvertedFile, FailedFile, PARTIAL_MESSAGE, SUCCESS_MESSAGE,
};
use crate::state::AppState;
use crate::upload;

#[derive(OpenApi)]
#[openapi(
    paths(convert_png_to_svg, convert_png_to_webp),
    components(schemas(ConvertUpload, ConvertResponse, ConvertedFile, FailedFile)),
)]
pub struct ConvertApi;

/// Register conversion routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/convert-png-to-svg", post(convert_png_to_svg))
        .route("/convert-png-to-webp", post(convert_png_to_webp))
}

/// Trace uploaded images to SVG (`POST /convert-png-to-svg`).
#[utoipa::path(
    post,
    path = "/convert-png-to-svg",
    tag = "convert",
    request_body(content = ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "All files converted", body = ConvertResponse),
        (status = 400, description = "No files, too many files or malformed upload"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Conversion error"),
    )
)]
pub async fn convert_png_to_svg(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ServerError> {
    run_batch(&state, &state.vector, accept_multipart(multipart)?).await
}

/// Re-encode uploaded images as lossless WebP (`POST /convert-png-to-webp`).
#[utoipa::path(
    post,
    path = "/convert-png-to-webp",
    tag = "convert",
    request_body(content = ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "All files converted", body = ConvertResponse),
        (status = 400, description = "No files, too many files or malformed upload"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Conversion error"),
    )
)]
pub async fn convert_png_to_webp(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ServerError> {
    run_batch(&state, &state.raster, accept_multipart(multipart)?).await
}

/// A request without a multipart body carries no files.
fn accept_multipart(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Multipart, ServerError> {
    multipart.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "request is not multipart");
        ServerError::BadRequest("No files uploaded.".into())
    })
}

async fn run_batch(
    state: &AppState,
    converter: &BatchConverter,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ServerError> {
    let cfg = &state.config;
    let batch = upload::spool(&mut multipart, &cfg.upload_dir, cfg.max_files).await?;
    if batch.is_empty() {
        return Err(ServerError::BadRequest("No files uploaded.".into()));
    }
    debug!(
        kind = %converter.kind(),
        files = batch.len(),
        policy = %cfg.aggregation,
        "batch received"
    );

    let response = match cfg.aggregation {
        AggregationPolicy::AllOrNothing => converter
            .convert_all(batch.files())
            .await
            .map(|results| ConvertResponse {
                message: SUCCESS_MESSAGE.into(),
                files: results.into_iter().map(ConvertedFile::from).collect(),
                failures: Vec::new(),
            })
            .map_err(ServerError::from),
        AggregationPolicy::Partial => fold_partial(converter.convert_each(batch.files()).await),
    };

    if cfg.keep_uploads {
        debug!(files = batch.len(), "keeping spooled uploads");
    } else {
        batch.cleanup().await;
    }

    let response = response?;
    info!(
        kind = %converter.kind(),
        converted = response.files.len(),
        failed = response.failures.len(),
        "conversion request finished"
    );
    Ok(Json(response))
}

fn fold_partial(
    outcomes: Vec<Result<ConversionResult, ConvertError>>,
) -> Result<ConvertResponse, ServerError> {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => files.push(ConvertedFile::from(result)),
            Err(e) => errors.push(e),
        }
    }

    if files.is_empty() {
        // Every file failed; report the first one like the fail-fast path does.
        return match errors.into_iter().next() {
            Some(first) => Err(first.into()),
            None => Err(ServerError::BadRequest("No files uploaded.".into())),
        };
    }

    let message = if errors.is_empty() { SUCCESS_MESSAGE } else { PARTIAL_MESSAGE };
    Ok(ConvertResponse {
        message: message.into(),
        files,
        failures: errors.iter().map(FailedFile::from).collect(),
    })
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::path::Path;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use image::{ImageFormat, Rgba, RgbaImage};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use tracing_test::traced_test;

    use crate::config::Config;
    use crate::routes;
    use crate::state::AppState;

    use super::*;

    const BOUNDARY: &str = "pngforge-test-boundary";

    struct Part<'a> {
        field: &'a str,
        filename: Option<&'a str>,
        bytes: Vec<u8>,
    }

    fn image_part(filename: &str, bytes: Vec<u8>) -> Part<'_> {
        Part {
            field: "images",
            filename: Some(filename),
            bytes,
        }
    }

    fn png() -> Vec<u8> {
        let img = RgbaImage::from_fn(24, 24, |x, y| {
            if (6..18).contains(&x) && (6..18).contains(&y) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.filename {
                Some(name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{name}\"\r\n\
                         Content-Type: image/png\r\n\r\n",
                        part.field
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        part.field
                    )
                    .as_bytes(),
                ),
            }
            body.extend_from_slice(&part.bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn setup(customize: impl FnOnce(&mut Config)) -> (TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("output"),
            ..Config::default()
        };
        customize(&mut cfg);
        let state = Arc::new(AppState::new(cfg).unwrap());
        (dir, state)
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = routes::build(Arc::clone(state)).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    async fn send_multipart(
        state: &Arc<AppState>,
        uri: &str,
        parts: &[Part<'_>],
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        send(state, req).await
    }

    fn spool_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn single_png_to_webp() {
        let (_dir, state) = setup(|_| {});

        let parts = [image_part("photo.png", png())];
        let (status, body) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], SUCCESS_MESSAGE);
        let files = body["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["filename"], "photo.webp");

        let out = Path::new(files[0]["outputPath"].as_str().unwrap());
        assert_eq!(out, state.config.output_dir.join("photo.webp"));
        let bytes = std::fs::read(out).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
        assert!(spool_is_empty(&state.config.upload_dir), "uploads should be cleaned up");
    }

    #[tokio::test]
    async fn many_pngs_to_svg_keep_upload_order() {
        let (_dir, state) = setup(|_| {});
        let names = ["zeta.png", "alpha.png", "mid.PNG", "logo"];
        let parts: Vec<_> = names.iter().map(|n| image_part(n, png())).collect();

        let (status, body) = send_multipart(&state, "/convert-png-to-svg", &parts).await;

        assert_eq!(status, StatusCode::OK, "{body}");
        let got: Vec<_> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["filename"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(got, ["zeta.svg", "alpha.svg", "mid.svg", "logo.svg"]);
        for f in body["files"].as_array().unwrap() {
            let svg = std::fs::read_to_string(f["outputPath"].as_str().unwrap()).unwrap();
            assert!(svg.contains("<svg"));
        }
    }

    #[tokio::test]
    async fn no_files_is_a_400() {
        let (_dir, state) = setup(|_| {});
        for uri in ["/convert-png-to-svg", "/convert-png-to-webp"] {
            let parts = [Part {
                field: "note",
                filename: None,
                bytes: b"just text".to_vec(),
            }];
            let (status, body) = send_multipart(&state, uri, &parts).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "No files uploaded.");
        }
    }

    #[tokio::test]
    async fn missing_body_is_a_400_with_json_error() {
        let (_dir, state) = setup(|_| {});
        for uri in ["/convert-png-to-svg", "/convert-png-to-webp"] {
            let req = Request::post(uri).body(Body::empty()).unwrap();

            let (status, body) = send(&state, req).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "No files uploaded.");
        }
    }

    #[tokio::test]
    async fn form_urlencoded_body_is_a_400_with_json_error() {
        let (_dir, state) = setup(|_| {});
        let req = Request::post("/convert-png-to-webp")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("images=photo.png"))
            .unwrap();

        let (status, body) = send(&state, req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No files uploaded.");
        assert!(spool_is_empty(&state.config.upload_dir));
    }

    #[tokio::test]
    async fn webp_batch_with_broken_file_reports_conversion_error() {
        let (_dir, state) = setup(|_| {});
        let parts = [
            image_part("good.png", png()),
            image_part("bad.png", b"garbage".to_vec()),
        ];

        let (status, body) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error converting images: Error converting image: bad.png");
    }

    #[tokio::test]
    async fn too_many_files_is_a_400_and_leaves_no_spool() {
        let (_dir, state) = setup(|cfg| cfg.max_files = 2);
        let parts: Vec<_> = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|n| image_part(n, png()))
            .collect();

        let (status, body) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Too many files: at most 2 allowed.");
        assert!(spool_is_empty(&state.config.upload_dir));
        assert!(spool_is_empty(&state.config.output_dir));
    }

    #[tokio::test]
    async fn unexpected_file_field_is_rejected() {
        let (_dir, state) = setup(|_| {});
        let parts = [Part {
            field: "avatar",
            filename: Some("me.png"),
            bytes: png(),
        }];

        let (status, body) = send_multipart(&state, "/convert-png-to-svg", &parts).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unexpected field: avatar");
    }

    #[tokio::test]
    #[traced_test]
    async fn one_broken_file_fails_the_batch() {
        let (_dir, state) = setup(|_| {});
        let parts = [
            image_part("good.png", png()),
            image_part("bad.png", b"\x89PNG but not really".to_vec()),
        ];

        let (status, body) = send_multipart(&state, "/convert-png-to-svg", &parts).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error converting images: Error processing image: bad.png");
        assert!(body.get("files").is_none());
        assert!(spool_is_empty(&state.config.upload_dir));
        assert!(logs_contain("conversion failed"));
    }

    #[tokio::test]
    async fn partial_mode_reports_successes_and_failures() {
        let (_dir, state) = setup(|cfg| cfg.aggregation = AggregationPolicy::Partial);
        let parts = [
            image_part("good.png", png()),
            image_part("bad.png", b"garbage".to_vec()),
        ];

        let (status, body) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], PARTIAL_MESSAGE);
        assert_eq!(body["files"].as_array().unwrap().len(), 1);
        assert_eq!(body["files"][0]["filename"], "good.webp");
        assert_eq!(body["failures"][0]["filename"], "bad.png");
        assert_eq!(body["failures"][0]["error"], "Error converting image: bad.png");
    }

    #[tokio::test]
    async fn partial_mode_with_every_file_failing_is_a_500() {
        let (_dir, state) = setup(|cfg| cfg.aggregation = AggregationPolicy::Partial);
        let parts = [image_part("bad.png", b"garbage".to_vec())];

        let (status, body) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error converting images: Error converting image: bad.png");
    }

    #[tokio::test]
    async fn keep_uploads_leaves_spooled_files() {
        let (_dir, state) = setup(|cfg| cfg.keep_uploads = true);

        let parts = [image_part("a.png", png())];
        let (status, _) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!spool_is_empty(&state.config.upload_dir));
    }

    #[tokio::test]
    async fn oversized_body_is_a_413() {
        let (_dir, state) = setup(|cfg| cfg.max_upload_size_mb = 0);

        let parts = [image_part("a.png", png())];
        let (status, _) = send_multipart(&state, "/convert-png-to-webp", &parts).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn traversal_names_stay_inside_output_dir() {
        let (_dir, state) = setup(|_| {});

        let parts = [image_part("../../evil.png", png())];
        let (status, body) = send_multipart(&state, "/convert-png-to-svg", &parts).await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["files"][0]["filename"], "evil.svg");
        assert!(state.config.output_dir.join("evil.svg").exists());
    }

    #[tokio::test]
    async fn trace_id_is_echoed() {
        let (_dir, state) = setup(|_| {});
        let id = "6c0d7f7e-3c1e-4f37-9f6e-0d4b1b7c2a11";
        let req = Request::get("/health")
            .header(crate::middleware::trace::X_TRACE_ID, id)
            .body(Body::empty())
            .unwrap();

        let resp = routes::build(state).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[crate::middleware::trace::X_TRACE_ID], id);
    }
}
