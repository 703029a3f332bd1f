//! The persisted canvas record and its conversation / audit trail.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::document::CanvasDocument;
use crate::suggestion::SuggestionCache;
use crate::{now_millis, CanvasId, UserId};

pub const DEFAULT_CANVAS_NAME: &str = "Untitled Canvas";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanvasStatus {
    /// Created, nothing generated yet.
    #[default]
    Created,
    /// At least one canvas has been generated.
    Drafted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One exchange in the canvas conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    /// Text shown to the user.
    pub content: String,
    /// Exact text exchanged with the model (full prompt or full reply).
    pub raw: String,
    pub at: u64,
}

/// A reference document supplied with a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: u64,
    pub actor: UserId,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasRecord {
    pub id: CanvasId,
    pub name: String,
    #[serde(default)]
    pub status: CanvasStatus,
    pub owner: UserId,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default)]
    pub document: CanvasDocument,
    #[serde(default)]
    pub board: Board,
    #[serde(default)]
    pub suggestions: SuggestionCache,
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl CanvasRecord {
    pub fn new(owner: UserId, name: Option<String>) -> Self {
        let now = now_millis();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_CANVAS_NAME.to_string());
        let mut record = Self {
            id: CanvasId::new(),
            name,
            status: CanvasStatus::Created,
            owner: owner.clone(),
            attachments: Vec::new(),
            conversation: Vec::new(),
            document: CanvasDocument::new(),
            board: Board::new(),
            suggestions: SuggestionCache::new(),
            audit_log: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        record.audit(&owner, "canvas created");
        record
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    /// Record a mutation and bump `updated_at`.
    pub fn audit(&mut self, actor: &UserId, action: impl Into<String>) {
        let now = now_millis();
        // Keep timestamps monotonic even if the clock steps back.
        self.updated_at = now.max(self.updated_at);
        self.audit_log.push(AuditEntry {
            at: self.updated_at,
            actor: actor.clone(),
            action: action.into(),
        });
    }

    pub fn push_turn(&mut self, role: Role, content: impl Into<String>, raw: impl Into<String>) {
        self.conversation.push(ConversationTurn {
            role,
            content: content.into(),
            raw: raw.into(),
            at: now_millis(),
        });
    }

    /// Whether the model has not been asked anything yet.
    pub fn is_first_message(&self) -> bool {
        self.conversation.is_empty()
    }

    /// Name the canvas after its Title field when one is set.
    pub fn sync_name_with_title(&mut self) {
        if let Some(title) = self.document.title().map(str::trim).filter(|t| !t.is_empty()) {
            self.name = title.to_string();
        }
    }

    pub fn summary(&self) -> CanvasSummary {
        CanvasSummary {
            canvas_id: self.id,
            title: self.name.clone(),
            problem_statement: self.document.problem_statement().map(str::to_string),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSummary {
    pub canvas_id: CanvasId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
    pub status: CanvasStatus,
    pub created_at: u64,
    pub updated_at: u64,
}
