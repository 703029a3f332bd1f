//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;

use crate::types::{respond, ApiResult, ApiState, HealthResponse};

/// Handler for GET /api/health
pub async fn health_handler(State(state): State<Arc<ApiState>>) -> ApiResult<HealthResponse> {
    let status = state.ops.status().await?;
    respond(HealthResponse {
        status: "ok".to_string(),
        provider: status.provider,
        canvas_count: status.canvas_count,
    })
}
