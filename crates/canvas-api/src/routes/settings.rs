//! Settings endpoints: LLM credentials and disabled fields.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use canvas_core::LlmSettings;
use canvas_ops::{SettingsResponse, UpdateFieldsRequest};
use serde::Deserialize;
use tracing::info;

use crate::extract::{UserIdentity, ValidJson};
use crate::types::{respond, ApiResult, ApiState};

/// Query parameters for the credential update.
#[derive(Debug, Deserialize)]
pub struct LlmQuery {
    /// Probe the provider before storing (default true).
    #[serde(default)]
    pub validate: Option<bool>,
}

/// GET /api/settings
pub async fn settings_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(_user): UserIdentity,
) -> ApiResult<SettingsResponse> {
    respond(state.ops.settings().await?)
}

/// PUT /api/settings/llm
pub async fn llm_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    query: Result<Query<LlmQuery>, QueryRejection>,
    ValidJson(llm): ValidJson<LlmSettings>,
) -> ApiResult<SettingsResponse> {
    let Query(query) = query?;
    let validate = query.validate.unwrap_or(true);
    info!(user = %user, vendor = llm.vendor(), validate, "LLM settings update");
    respond(state.ops.update_llm(llm, validate).await?)
}

/// PUT /api/settings/fields
pub async fn fields_handler(
    State(state): State<Arc<ApiState>>,
    UserIdentity(user): UserIdentity,
    ValidJson(request): ValidJson<UpdateFieldsRequest>,
) -> ApiResult<SettingsResponse> {
    info!(user = %user, disabled = request.disabled_fields.len(), "Field settings update");
    respond(state.ops.update_disabled_fields(request).await?)
}
