//! Liveness and active-strategy report.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub predicate: String,
    pub renderer: String,
    pub channel: String,
    pub config: serde_json::Value,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pipeline = &state.pipeline;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        predicate: pipeline.engine.predicate_name().to_string(),
        renderer: pipeline.composer.renderer_name().to_string(),
        channel: pipeline.dispatcher.channel_name().to_string(),
        config: state.config.redacted_summary(),
    })
}
