//! HTTP surface of the marketplace.
//!
//! Thin handlers over the service layer: extract, delegate, translate
//! the error. Authentication is an extractor, so a route is public
//! exactly when its handler takes no [`Actor`](crate::domain::Actor).

pub mod auth;
pub mod error;
pub mod extract;
pub mod pictures;
pub mod products;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::services::{AuthService, CatalogService, GalleryService};

pub use error::{ApiError, ApiResult};

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
    pub gallery: Arc<GalleryService>,
}

/// Build the application router.
///
/// The body limit leaves headroom above the upload cap so an oversized
/// picture reaches the gallery service and fails with a 400 there,
/// instead of a generic 413 from the limit layer.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/products", post(products::create).get(products::list))
        .route(
            "/api/products/{id}",
            get(products::get).put(products::update).delete(products::remove),
        )
        .route(
            "/api/products/{id}/pictures",
            post(pictures::upload).get(pictures::list),
        )
        .route(
            "/api/products/{id}/pictures/{picture_id}",
            delete(pictures::detach),
        )
        .route("/api/products/{id}/cover/{picture_id}", put(pictures::set_cover))
        .route("/api/pictures/{id}", get(pictures::fetch))
        .layer(DefaultBodyLimit::max(max_upload_bytes + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind and serve until ctrl-c.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    max_upload_bytes: usize,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "REST API listening");
    axum::serve(listener, router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
