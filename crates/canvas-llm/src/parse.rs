//! Turning model text into chat text, canvas JSON and suggestion drafts.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::prompts::{CANVAS_MARKER, CHAT_MARKER};

/// A suggestion as proposed by the model, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestionDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

/// Split a `---CHAT_RESPONSE--- ... ---CANVAS_JSON--- {...}` reply.
pub fn parse_dual_response(text: &str) -> LlmResult<(String, Value)> {
    let parts: Vec<&str> = text.split(CANVAS_MARKER).collect();
    if parts.len() != 2 {
        return Err(LlmError::Parse(
            "Response does not contain both CHAT_RESPONSE and CANVAS_JSON sections".into(),
        ));
    }

    let chat = match parts[0].split_once(CHAT_MARKER) {
        Some((_, after)) => after.trim(),
        None => parts[0].trim(),
    };
    let canvas = parse_json_from_text(parts[1])?;
    Ok((chat.to_string(), canvas))
}

/// Strip markdown fences.
fn scrub_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Extract the outermost JSON object from free text.
pub fn parse_json_from_text(text: &str) -> LlmResult<Value> {
    let cleaned = scrub_fences(text);
    let candidate = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned.as_str(),
    };
    serde_json::from_str(candidate).map_err(|err| LlmError::Parse(format!("Invalid JSON format: {err}")))
}

/// Extract suggestion drafts from the outermost JSON array.
///
/// A `{"suggestions": [...]}` wrapper is accepted as well. Drafts with
/// blank titles are dropped.
pub fn parse_suggestions(text: &str) -> LlmResult<Vec<SuggestionDraft>> {
    let cleaned = scrub_fences(text);

    let value: Value = match (cleaned.find('['), cleaned.rfind(']')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&cleaned[start..=end])
            .or_else(|_| parse_json_from_text(&cleaned))?,
        _ => parse_json_from_text(&cleaned)?,
    };
    let list = match value {
        Value::Object(mut object) => object
            .remove("suggestions")
            .ok_or_else(|| LlmError::Parse("Expected a JSON array of suggestions".into()))?,
        other => other,
    };

    let drafts: Vec<SuggestionDraft> = serde_json::from_value(list)
        .map_err(|err| LlmError::Parse(format!("Invalid suggestion list: {err}")))?;
    Ok(drafts
        .into_iter()
        .filter(|d| !d.title.trim().is_empty())
        .collect())
}
