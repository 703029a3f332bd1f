//! Core domain types for business canvases.
//!
//! A canvas is a structured business case (title, problem statement,
//! objectives, KPIs, risks, ...) generated and refined through a
//! conversation with an LLM, then broken down into epics, features and
//! stories on a board.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod board;
pub mod canvas;
pub mod document;
pub mod fields;
pub mod settings;
pub mod suggestion;

pub use board::{Board, BoardColumn, BoardError, WorkItem, WorkItemKind, WorkItemPatch};
pub use canvas::{
    Attachment, AuditEntry, CanvasRecord, CanvasStatus, CanvasSummary, ConversationTurn, Role,
    DEFAULT_CANVAS_NAME,
};
pub use document::{CanvasDocument, FieldEdit, FieldEnvelope, FieldState, GenerationOutcome};
pub use fields::{validate_canvas_structure, CanvasFields, FieldKey, RenderKind};
pub use settings::{LlmSettings, Settings};
pub use suggestion::{Suggestion, SuggestionCache};

/// Identifier of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasId(Uuid);

impl CanvasId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CanvasId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CanvasId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity of the session user, as provided by the upstream session layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fresh identifier for work items and suggestions.
pub fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_ids_parse_back_from_display() {
        let id = CanvasId::new();
        let parsed: CanvasId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<CanvasId>().is_err());
    }

    #[test]
    fn canvas_id_serializes_as_a_plain_string() {
        let id = CanvasId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }
}
