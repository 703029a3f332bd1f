//! Error types for the operations layer.

use canvas_core::BoardError;
use canvas_llm::LlmError;
use thiserror::Error;

/// Result type for operations.
pub type OpsResult<T> = Result<T, OpsError>;

/// Errors that can occur during operations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// No canvas with this id.
    #[error("Canvas not found: {id}")]
    CanvasNotFound { id: String },

    /// The canvas belongs to another user.
    #[error("Access to canvas {id} is forbidden")]
    Forbidden { id: String },

    #[error("Work item not found: {0}")]
    WorkItemNotFound(String),

    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(String),

    /// Input failed validation.
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    /// The request clashes with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No LLM credentials have been stored yet.
    #[error("No LLM provider configured. Store credentials via PUT /api/settings/llm or the AZURE_OPENAI_* / GEMINI_* environment variables")]
    ProviderNotConfigured,

    /// The provider rejected the probe call.
    #[error("LLM credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The model answered, but not in the dual chat / canvas format.
    #[error("Could not parse the model response: {0}")]
    ResponseParse(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OpsError {
    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(id: impl ToString) -> Self {
        Self::CanvasNotFound { id: id.to_string() }
    }
}

impl From<BoardError> for OpsError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::NotFound(id) => OpsError::WorkItemNotFound(id),
            BoardError::DuplicateId(_) => OpsError::Conflict(err.to_string()),
            other => OpsError::validation("Invalid work item", vec![other.to_string()]),
        }
    }
}

impl From<anyhow::Error> for OpsError {
    fn from(err: anyhow::Error) -> Self {
        OpsError::Config(err.to_string())
    }
}
