use thiserror::Error;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The vendor answered, but not in the documented shape.
    #[error("Malformed LLM response: {0}")]
    Malformed(String),

    /// The model's text could not be turned into the expected structure.
    #[error("Failed to parse LLM output: {0}")]
    Parse(String),

    #[error("Invalid LLM configuration: {0}")]
    Config(String),
}
