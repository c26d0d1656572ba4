use axum::routing::get;
use axum::{Json, Router};
use common::dtos::{HealthDto, RootDto, RootLinks};
use common::util::consts::{NAME, VERSION};

pub fn create_route() -> Router {
    Router::new().route("/", get(root_links)).route("/health", get(health))
}

pub async fn root_links() -> Json<RootDto<'static>> {
    Json(RootDto {
        version: VERSION,
        name: NAME,
        _links: RootLinks {
            health: "/health",
            upload: "/upload",
            convert_image: "/convert/image",
            convert_document: "/convert/document",
            download: "/download/{filename}",
        },
    })
}

#[tracing::instrument]
pub async fn health() -> Json<HealthDto<'static>> {
    Json(HealthDto {
        status: "ok",
        message: "Backend is running!",
    })
}
