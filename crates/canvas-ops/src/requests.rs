//! Request DTOs for operations.
//!
//! Each request carries everything one operation needs and knows how to
//! check itself, so the REST layer can reject bad input before any work.

use std::collections::BTreeSet;

use canvas_core::{Attachment, BoardColumn, FieldKey, WorkItemKind};
use serde::{Deserialize, Serialize};

/// Semantic checks beyond what deserialization enforces.
pub trait Validate {
    /// Every problem found; empty when the request is acceptable.
    fn validate(&self) -> Vec<String>;
}

fn required(name: &str, value: &str, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("'{}' must not be empty", name));
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCanvasRequest {
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for CreateCanvasRequest {
    fn validate(&self) -> Vec<String> {
        match &self.name {
            Some(name) if name.chars().count() > 200 => {
                vec!["'name' must be at most 200 characters".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCanvasRequest {
    pub name: String,
}

impl Validate for RenameCanvasRequest {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required("name", &self.name, &mut errors);
        if self.name.chars().count() > 200 {
            errors.push("'name' must be at most 200 characters".to_string());
        }
        errors
    }
}

/// A chat message, optionally with reference documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SendMessageRequest {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.attachments.push(Attachment {
            name: name.into(),
            text: text.into(),
        });
        self
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required("message", &self.message, &mut errors);
        for (i, attachment) in self.attachments.iter().enumerate() {
            required(&format!("attachments[{}].name", i), &attachment.name, &mut errors);
        }
        errors
    }
}

/// Manual replacement of the whole canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceFieldsRequest {
    pub canvas: serde_json::Value,
}

impl Validate for ReplaceFieldsRequest {
    fn validate(&self) -> Vec<String> {
        if self.canvas.is_object() {
            Vec::new()
        } else {
            vec!["'canvas' must be a JSON object".to_string()]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddWorkItemRequest {
    pub kind: WorkItemKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub okr_ref: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub column: BoardColumn,
}

impl Validate for AddWorkItemRequest {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required("title", &self.title, &mut errors);
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveWorkItemRequest {
    pub column: BoardColumn,
    /// Zero-based position in the target column; clamped to its length.
    #[serde(default)]
    pub position: usize,
}

impl Validate for MoveWorkItemRequest {
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Ask the model for epics, features or stories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub kind: WorkItemKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Discard cached pending suggestions and ask again.
    #[serde(default)]
    pub refresh: bool,
}

impl Validate for SuggestRequest {
    fn validate(&self) -> Vec<String> {
        match (self.kind, &self.parent_id) {
            (WorkItemKind::Epic, Some(_)) => vec!["Epic suggestions take no 'parent_id'".to_string()],
            (WorkItemKind::Feature | WorkItemKind::Story, None) => {
                vec![format!("'parent_id' is required for {} suggestions", self.kind)]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFieldsRequest {
    pub disabled_fields: BTreeSet<FieldKey>,
}

impl Validate for UpdateFieldsRequest {
    fn validate(&self) -> Vec<String> {
        canvas_core::Settings::validate_disabled_fields(&self.disabled_fields)
            .err()
            .unwrap_or_default()
    }
}

/// The key is checked once the stored one has been restored.
impl Validate for canvas_core::LlmSettings {
    fn validate(&self) -> Vec<String> {
        self.validate_submitted()
    }
}

impl Validate for canvas_core::FieldEdit {
    fn validate(&self) -> Vec<String> {
        match self.confidence {
            Some(c) if !(0.0..=1.0).contains(&c) => {
                vec!["'confidence' must be between 0 and 1".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

impl Validate for canvas_core::WorkItemPatch {
    fn validate(&self) -> Vec<String> {
        match &self.title {
            Some(title) if title.trim().is_empty() => vec!["'title' must not be empty".to_string()],
            _ => Vec::new(),
        }
    }
}
