//! Chat-completion providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canvas_core::LlmSettings;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{LlmError, LlmResult};

/// Bodies of failed calls are cut to this many characters in errors.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat model behind some vendor API.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Vendor name, e.g. `azure-openai`.
    fn name(&self) -> &str;

    /// Deployment or model identifier.
    fn model(&self) -> &str;

    /// Send the conversation and return the assistant's text.
    async fn complete(&self, messages: &[ChatMessage]) -> LlmResult<String>;
}

fn build_client(timeout: Duration) -> LlmResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| LlmError::Config(format!("failed to build http client: {err}")))
}

fn header_value(value: &str) -> LlmResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| LlmError::Config("invalid api key header".into()))
}

async fn post_json(client: &Client, url: &str, headers: HeaderMap, body: &Value) -> LlmResult<Value> {
    let response = client.post(url).headers(headers).json(body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(0);
            text.truncate(cut);
        }
        return Err(LlmError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    response
        .json()
        .await
        .map_err(|err| LlmError::Malformed(err.to_string()))
}

// =============================================================================
// Azure OpenAI
// =============================================================================

/// Azure OpenAI chat completions on a named deployment.
pub struct AzureOpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> LlmResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn model(&self) -> &str {
        &self.deployment
    }

    async fn complete(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("api-key", header_value(&self.api_key)?);

        let body = json!({ "messages": messages });
        let raw = post_json(&self.client, &self.url(), headers, &body).await?;

        let completion: ChatCompletionResponse =
            serde_json::from_value(raw).map_err(|err| LlmError::Malformed(err.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Malformed("response missing choices".into()))?;
        debug!(provider = "azure-openai", chars = content.len(), "llm response received");
        Ok(content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

// =============================================================================
// Gemini
// =============================================================================

/// Google Gemini `generateContent`.
pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> LlmResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// System messages go to `systemInstruction`; assistant turns use role `model`.
    fn request_body(messages: &[ChatMessage]) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = if m.role == ChatRole::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", header_value(&self.api_key)?);

        let body = Self::request_body(messages);
        let raw = post_json(&self.client, &self.url(), headers, &body).await?;

        let response: GenerateContentResponse =
            serde_json::from_value(raw).map_err(|err| LlmError::Malformed(err.to_string()))?;
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("response missing candidates".into()))?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.is_empty() {
            return Err(LlmError::Malformed("candidate has no text parts".into()));
        }
        debug!(provider = "gemini", chars = text.len(), "llm response received");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

// =============================================================================
// Factory
// =============================================================================

/// Build the provider described by stored settings.
pub fn provider_from_settings(
    settings: &LlmSettings,
    timeout: Duration,
) -> LlmResult<Arc<dyn LlmProvider>> {
    let problems = settings.validate();
    if !problems.is_empty() {
        return Err(LlmError::Config(problems.join("; ")));
    }

    Ok(match settings {
        LlmSettings::Azure {
            endpoint,
            api_key,
            deployment,
            api_version,
        } => Arc::new(AzureOpenAiProvider::new(
            endpoint,
            api_key,
            deployment,
            api_version,
            timeout,
        )?),
        LlmSettings::Gemini {
            endpoint,
            api_key,
            model,
        } => Arc::new(GeminiProvider::new(endpoint, api_key, model, timeout)?),
    })
}

/// Cheap round trip used to check credentials before they are stored.
pub async fn probe(provider: &dyn LlmProvider) -> LlmResult<()> {
    let reply = provider
        .complete(&[
            ChatMessage::system("Reply with a single word."),
            ChatMessage::user("hi"),
        ])
        .await?;
    if reply.trim().is_empty() {
        return Err(LlmError::Malformed("empty reply to probe".into()));
    }
    Ok(())
}
