//! Chat endpoints: canvas generation and refinement.

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use canvas_core::CanvasId;
use canvas_ops::{HistoryEntry, MessageResponse, SendMessageRequest};
use tracing::info;

use crate::extract::{UserIdentity, ValidJson};
use crate::types::{respond, ApiResult, ApiState};

/// POST /api/canvas/{id}/message
///
/// The first message generates the canvas, later ones refine it.
pub async fn message_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
    ValidJson(request): ValidJson<SendMessageRequest>,
) -> ApiResult<MessageResponse> {
    let Path(id) = path?;
    info!(
        canvas = %id,
        attachments = request.attachments.len(),
        "Message request"
    );

    let response = state.ops.send_message(&user, id, request).await?;
    info!(
        canvas = %id,
        warnings = response.warnings.len(),
        preserved = response.preserved_fields.len(),
        "Message answered"
    );
    respond(response)
}

/// GET /api/canvas/{id}/history
pub async fn history_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    path: Result<Path<CanvasId>, PathRejection>,
) -> ApiResult<Vec<HistoryEntry>> {
    let Path(id) = path?;
    respond(state.ops.history(&user, id).await?)
}
