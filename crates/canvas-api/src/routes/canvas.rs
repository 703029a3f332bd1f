//! Canvas lifecycle and field endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use canvas_core::{CanvasId, CanvasSummary, FieldEdit, FieldEnvelope, FieldKey};
use canvas_ops::{CanvasDetail, CreateCanvasRequest, RenameCanvasRequest, ReplaceFieldsRequest};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::extract::{UserIdentity, ValidJson};
use crate::types::{respond, ApiError, ApiResponse, ApiResult, ApiState};

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub canvas_id: CanvasId,
    pub deleted: bool,
}

/// Fields of a canvas; `canvas` is null until something was generated.
#[derive(Debug, Serialize)]
pub struct FieldsResponse {
    pub canvas_id: CanvasId,
    pub canvas: Option<Value>,
}

/// POST /api/canvas/create - Create an empty canvas.
///
/// The body is optional; `{ "name": "..." }` overrides the default name.
pub async fn create_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<CanvasDetail>>), ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateCanvasRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| {
            ApiError::bad_request("Invalid request body").with_details(vec![err.to_string()])
        })?
    };

    let record = state.ops.create_canvas(&user, request).await?;
    info!(canvas = %record.id, "Canvas created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CanvasDetail::from(&record))),
    ))
}

/// GET /api/canvas/list - Drafted canvases of the caller.
pub async fn list_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
) -> ApiResult<Vec<CanvasSummary>> {
    respond(state.ops.list_canvases(&user).await?)
}

/// GET /api/canvas/{id}
pub async fn get_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
) -> ApiResult<CanvasDetail> {
    let Path(id) = path?;
    respond(state.ops.get_canvas(&user, id).await?)
}

/// PATCH /api/canvas/{id} - Rename.
pub async fn rename_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
    ValidJson(request): ValidJson<RenameCanvasRequest>,
) -> ApiResult<CanvasSummary> {
    let Path(id) = path?;
    respond(state.ops.rename_canvas(&user, id, request).await?)
}

/// DELETE /api/canvas/{id}
pub async fn delete_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
) -> ApiResult<DeletedResponse> {
    let Path(id) = path?;
    state.ops.delete_canvas(&user, id).await?;
    respond(DeletedResponse {
        canvas_id: id,
        deleted: true,
    })
}

/// GET /api/canvas/{id}/fields
pub async fn fields_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
) -> ApiResult<FieldsResponse> {
    let Path(id) = path?;
    let canvas = state.ops.get_fields(&user, id).await?;
    respond(FieldsResponse {
        canvas_id: id,
        canvas,
    })
}

/// PUT /api/canvas/{id}/fields - Manual save of the whole canvas.
pub async fn replace_fields_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
    ValidJson(request): ValidJson<ReplaceFieldsRequest>,
) -> ApiResult<FieldsResponse> {
    let Path(id) = path?;
    let canvas = state.ops.replace_fields(&user, id, request).await?;
    respond(FieldsResponse {
        canvas_id: id,
        canvas: Some(canvas),
    })
}

/// PUT /api/canvas/{id}/fields/{field} - Edit, lock or unlock one field.
pub async fn edit_field_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<(CanvasId, String)>, PathRejection>,
    ValidJson(edit): ValidJson<FieldEdit>,
) -> ApiResult<FieldEnvelope> {
    let Path((id, field)) = path?;
    let field: FieldKey = field.parse().map_err(ApiError::bad_request)?;
    respond(state.ops.edit_field(&user, id, field, edit).await?)
}
