//! Runs the match pipeline on demand.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use tender_core::MatchGroup;

use crate::pipeline::DispatchMode;
use crate::state::AppState;

use super::ErrorResponse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub user_vs_tender: MatchGroup,
}

/// Fetch both sheets, match, and start sending notifications.
///
/// Responds with the match group as soon as matching is done; delivery
/// continues in the background.
pub async fn extract_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExtractResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.pipeline.run(DispatchMode::Background).await {
        Ok(outcome) => Ok(Json(ExtractResponse {
            user_vs_tender: outcome.group,
        })),
        Err(e) => {
            tracing::error!(error = %e, "extract-data failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            ))
        }
    }
}
