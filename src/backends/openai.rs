use anyhow::{Context as _, Result};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::stream::{sse_data, LineBuffer};
use super::types::{BackendKind, StreamCallback};
use crate::constants::{HTTP_CONNECT_TIMEOUT_SECS, MODEL_LIST_TIMEOUT_SECS};

/// Client for services speaking the OpenAI chat-completions dialect.
/// Both cloud backends go through this.
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    backend: BackendKind,
}

impl OpenAiCompatClient {
    pub fn new(
        backend: BackendKind,
        base_url: impl Into<String>,
        api_key: Option<String>,
        api_key_env: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
                .timeout(timeout)
                .build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_key_env: api_key_env.into(),
            backend,
        })
    }

    /// Attach the bearer token, failing early when none is configured
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.api_key {
            Some(key) => Ok(request.header("Authorization", format!("Bearer {}", key))),
            None => anyhow::bail!("{} API key not set ({})", self.backend.display_name(), self.api_key_env),
        }
    }

    async fn post_chat(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.authorized(self.client.post(&url).json(body))?;

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, error_text);
        }
        Ok(response)
    }

    /// Non-streaming completion
    pub async fn chat(&self, body: &Value) -> Result<ChatCompletionResponse> {
        let response = self.post_chat(body).await?;
        response
            .json::<ChatCompletionResponse>()
            .await
            .context("Malformed chat completion response")
    }

    /// Streaming completion over SSE; returns the concatenated text
    pub async fn chat_stream(
        &self,
        body: &Value,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String> {
        let response = self.post_chat(body).await?;

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut full_response = String::new();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Stream interrupted")?;
            for line in lines.push(&chunk) {
                if !apply_sse_line(&line, &mut full_response, stream_callback.as_ref()) {
                    break 'read;
                }
            }
        }
        if let Some(line) = lines.finish() {
            apply_sse_line(&line, &mut full_response, stream_callback.as_ref());
        }

        Ok(full_response)
    }

    /// List model ids from `/models`
    pub async fn models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let request = self
            .authorized(self.client.get(&url))?
            .timeout(Duration::from_secs(MODEL_LIST_TIMEOUT_SECS));

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Failed to fetch models: HTTP {}", status);
        }
        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

/// Handle one SSE line. Returns false once the `[DONE]` marker is seen.
fn apply_sse_line(line: &str, full_response: &mut String, callback: Option<&StreamCallback>) -> bool {
    let Some(data) = sse_data(line) else {
        return true;
    };
    if data == "[DONE]" {
        return false;
    }
    if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
        if let Some(delta) = chunk.choices.first().and_then(|c| c.delta.content.as_deref()) {
            if !delta.is_empty() {
                full_response.push_str(delta);
                if let Some(callback) = callback {
                    callback(delta);
                }
            }
        }
    }
    true
}

// Response structures (OpenAI format)

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// The first choice's message; a response with no choices is malformed
    pub fn into_message(self) -> Result<AssistantMessage> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("Response contained no choices")
    }
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl AssistantMessage {
    /// Tool calls requested by the model, if any
    pub fn take_tool_calls(&mut self) -> Vec<ToolCall> {
        self.tool_calls.take().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}
