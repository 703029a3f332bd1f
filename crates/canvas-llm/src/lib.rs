//! LLM access for Business Canvas AI.
//!
//! Two vendors sit behind the [`LlmProvider`] trait: Azure OpenAI chat
//! completions and Google Gemini. The prompt module builds the analyst
//! system prompt (embedding the canvas JSON schema) and the per-turn
//! prompts; the parse module turns replies back into canvas JSON.

pub mod error;
pub mod parse;
pub mod prompts;
pub mod provider;

pub use error::{LlmError, LlmResult};
pub use parse::{parse_dual_response, parse_json_from_text, parse_suggestions, SuggestionDraft};
pub use prompts::{
    canvas_schema, initial_prompt, refinement_prompt, suggestion_prompt, system_prompt,
};
pub use provider::{
    probe, provider_from_settings, AzureOpenAiProvider, ChatMessage, ChatRole, GeminiProvider,
    LlmProvider,
};
