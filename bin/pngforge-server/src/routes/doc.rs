use crate::routes::{convert, health};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "pngforge-server",
    description = "Batch PNG to SVG / WebP conversion API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(convert::ConvertApi::openapi());
    root
}
