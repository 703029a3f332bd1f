//! Work item suggestion endpoints.

use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use canvas_core::{CanvasId, Suggestion, WorkItem, WorkItemKind};
use canvas_ops::{SuggestRequest, SuggestResponse};
use serde::Deserialize;
use tracing::info;

use crate::extract::{UserIdentity, ValidJson};
use crate::types::{respond, ApiError, ApiResponse, ApiResult, ApiState};

/// Query parameters for the suggestion list.
#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    /// Only suggestions of this kind.
    #[serde(default)]
    pub kind: Option<WorkItemKind>,
    /// Only suggestions for this parent work item.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// GET /api/canvas/{id}/suggestions
pub async fn list_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
    query: Result<Query<SuggestionsQuery>, QueryRejection>,
) -> ApiResult<Vec<Suggestion>> {
    let Path(id) = path?;
    let Query(query) = query?;
    respond(
        state
            .ops
            .suggestions(&user, id, query.kind, query.parent_id.as_deref())
            .await?,
    )
}

/// POST /api/canvas/{id}/suggestions - Generate, or serve from cache.
pub async fn suggest_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
    ValidJson(request): ValidJson<SuggestRequest>,
) -> ApiResult<SuggestResponse> {
    let Path(id) = path?;
    info!(canvas = %id, kind = %request.kind, refresh = request.refresh, "Suggest request");

    let response = state.ops.suggest(&user, id, request).await?;
    info!(
        canvas = %id,
        count = response.suggestions.len(),
        from_cache = response.from_cache,
        "Suggestions ready"
    );
    respond(response)
}

/// POST /api/canvas/{id}/suggestions/{sid}/accept
pub async fn accept_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<(CanvasId, String)>, PathRejection>,
) -> Result<(StatusCode, Json<ApiResponse<WorkItem>>), ApiError> {
    let Path((id, suggestion_id)) = path?;
    let item = state.ops.accept_suggestion(&user, id, &suggestion_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(item))))
}
