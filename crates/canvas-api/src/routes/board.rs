//! Work breakdown board endpoints.

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use canvas_core::{Board, CanvasId, WorkItem, WorkItemPatch};
use canvas_ops::{AddWorkItemRequest, MoveWorkItemRequest, RemovedItemsResponse};
use tracing::info;

use crate::extract::{UserIdentity, ValidJson};
use crate::types::{respond, ApiError, ApiResponse, ApiResult, ApiState};

/// GET /api/canvas/{id}/board
pub async fn board_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
) -> ApiResult<Board> {
    let Path(id) = path?;
    respond(state.ops.board(&user, id).await?)
}

/// POST /api/canvas/{id}/board/items
pub async fn add_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
    ValidJson(request): ValidJson<AddWorkItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WorkItem>>), ApiError> {
    let Path(id) = path?;
    let item = state.ops.add_work_item(&user, id, request).await?;
    info!(canvas = %id, item = %item.id, kind = %item.kind, "Work item added");
    Ok((StatusCode::CREATED, Json(ApiResponse::new(item))))
}

/// PATCH /api/canvas/{id}/board/items/{item}
pub async fn update_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<(CanvasId, String)>, PathRejection>,
    ValidJson(patch): ValidJson<WorkItemPatch>,
) -> ApiResult<WorkItem> {
    let Path((id, item_id)) = path?;
    respond(state.ops.update_work_item(&user, id, &item_id, patch).await?)
}

/// POST /api/canvas/{id}/board/items/{item}/move - Returns the reordered board.
pub async fn move_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<(CanvasId, String)>, PathRejection>,
    ValidJson(request): ValidJson<MoveWorkItemRequest>,
) -> ApiResult<Board> {
    let Path((id, item_id)) = path?;
    respond(state.ops.move_work_item(&user, id, &item_id, request).await?)
}

/// DELETE /api/canvas/{id}/board/items/{item} - Removes descendants too.
pub async fn remove_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<(CanvasId, String)>, PathRejection>,
) -> ApiResult<RemovedItemsResponse> {
    let Path((id, item_id)) = path?;
    let removed = state.ops.remove_work_item(&user, id, &item_id).await?;
    info!(canvas = %id, count = removed.removed.len(), "Work items removed");
    respond(removed)
}
