//! Response DTOs for operations.

use canvas_core::{
    AuditEntry, Board, CanvasDocument, CanvasId, CanvasRecord, CanvasStatus, FieldKey, Role,
    Settings, Suggestion,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub canvas_id: CanvasId,
    pub chat_response: String,
    /// The canvas after the turn, locks applied.
    pub canvas_json: Value,
    /// Structural problems found in the generated canvas.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Locked fields the model was not allowed to change.
    #[serde(default)]
    pub preserved_fields: Vec<FieldKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Full canvas view without raw model transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasDetail {
    pub canvas_id: CanvasId,
    pub name: String,
    pub status: CanvasStatus,
    pub fields: CanvasDocument,
    pub board: Board,
    pub suggestions: Vec<Suggestion>,
    pub audit_log: Vec<AuditEntry>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&CanvasRecord> for CanvasDetail {
    fn from(record: &CanvasRecord) -> Self {
        Self {
            canvas_id: record.id,
            name: record.name.clone(),
            status: record.status,
            fields: record.document.clone(),
            board: record.board.clone(),
            suggestions: record.suggestions.all().to_vec(),
            audit_log: record.audit_log.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
    /// Whether the suggestions came from the cache instead of the model.
    pub from_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedItemsResponse {
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
}

/// Settings with secrets masked, plus the active provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub settings: Settings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderInfo>,
    pub canvas_count: usize,
}
