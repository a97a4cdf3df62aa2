//! HTTP router construction.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/extract-data", get(api::extract_data))
        .route(
            "/api/whatsapp",
            get(api::whatsapp_callback).post(api::whatsapp_callback),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
