use axum::{error_handling::HandleErrorLayer, extract::DefaultBodyLimit, Router};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::handle_timeout, settings::Settings, state::Services};

pub mod error;
pub mod routes;
pub mod settings;
pub mod state;

fn api_routes(services: Services) -> Router {
    Router::new()
        .merge(routes::root::create_route())
        .merge(routes::files::create_route(services.clone()))
        .merge(routes::convert::create_route(services))
}

/// Every route is served at the root and again under `/api`.
pub fn app(services: Services, settings: &Settings) -> Router {
    let routes = api_routes(services);
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TimeoutLayer::new(settings.request_timeout)),
        )
}
