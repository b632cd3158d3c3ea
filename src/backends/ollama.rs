use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::settings::{OllamaSettings, Settings};
use super::stream::LineBuffer;
use super::traits::Backend;
use super::types::{BackendKind, GenerationRequest, StreamCallback};
use crate::constants::{HTTP_CONNECT_TIMEOUT_SECS, MODEL_LIST_TIMEOUT_SECS};

/// Local Ollama server
pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
                .timeout(timeout)
                .build()?,
            base_url: format!("{}:{}", host.trim_end_matches('/'), port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(request: &GenerationRequest, settings: &OllamaSettings) -> Value {
        json!({
            "model": request.model,
            "messages": request.json_messages(),
            "stream": settings.stream,
            "options": {
                "num_predict": settings.num_predict,
                "temperature": settings.temperature,
                "top_k": settings.top_k,
                "top_p": settings.top_p,
                "repeat_penalty": settings.repeat_penalty,
            },
        })
    }

    async fn post_chat(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to Ollama at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, error_text);
        }
        Ok(response)
    }

    async fn chat_stream(&self, body: &Value, stream_callback: Option<StreamCallback>) -> Result<String> {
        let response = self.post_chat(body).await?;

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut full_response = String::new();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Stream interrupted")?;
            for line in lines.push(&chunk) {
                if apply_ndjson_line(&line, &mut full_response, stream_callback.as_ref())? {
                    break 'read;
                }
            }
        }
        if let Some(line) = lines.finish() {
            apply_ndjson_line(&line, &mut full_response, stream_callback.as_ref())?;
        }

        Ok(full_response)
    }
}

/// Handle one NDJSON chunk. Returns true once the server marks the reply done.
fn apply_ndjson_line(
    line: &str,
    full_response: &mut String,
    callback: Option<&StreamCallback>,
) -> Result<bool> {
    if line.trim().is_empty() {
        return Ok(false);
    }
    let chunk: ChatChunk = serde_json::from_str(line).context("Malformed stream chunk")?;
    if let Some(error) = chunk.error {
        anyhow::bail!("{}", error);
    }
    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            full_response.push_str(&message.content);
            if let Some(callback) = callback {
                callback(&message.content);
            }
        }
    }
    Ok(chunk.done)
}

#[async_trait]
impl Backend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    async fn complete(
        &self,
        request: &GenerationRequest,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String> {
        let Settings::Ollama(settings) = &request.settings else {
            anyhow::bail!("{} settings passed to Ollama", request.settings.backend());
        };
        let body = Self::request_body(request, settings);

        if settings.stream {
            return self.chat_stream(&body, stream_callback).await;
        }

        let chunk: ChatChunk = self
            .post_chat(&body)
            .await?
            .json()
            .await
            .context("Malformed chat response")?;
        if let Some(error) = chunk.error {
            anyhow::bail!("{}", error);
        }
        Ok(chunk.message.map(|m| m.content).unwrap_or_default())
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(MODEL_LIST_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("Failed to connect to Ollama at {}", self.base_url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch models: HTTP {}", response.status());
        }
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Debug, Deserialize)]
struct TagInfo {
    name: String,
}
