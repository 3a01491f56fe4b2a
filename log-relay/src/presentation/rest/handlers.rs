use axum::{Json, extract::State};
use std::sync::Arc;

use crate::domain::Clock;
use crate::presentation::rest::{ApiError, dto::*};

use super::AppState;

/// GET /health
pub async fn health<C: Clock>(State(state): State<Arc<AppState<C>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: state.clock.now(),
    })
}

/// GET /status
pub async fn status<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let snapshot = state
        .relay
        .snapshot()
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?;

    Ok(Json(StatusResponse::from_snapshot(
        &snapshot,
        state.clock.now(),
    )))
}
