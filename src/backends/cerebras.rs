use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::openai::OpenAiCompatClient;
use super::settings::{CerebrasSettings, Settings};
use super::tools::{dispatch_tool_call, math_tool_schema};
use super::traits::Backend;
use super::types::{BackendKind, GenerationRequest, StreamCallback};

/// Cerebras cloud backend, the only one that can call tools
pub struct CerebrasBackend {
    api: OpenAiCompatClient,
    max_tool_rounds: usize,
}

impl CerebrasBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        api_key_env: &str,
        max_tool_rounds: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api: OpenAiCompatClient::new(BackendKind::Cerebras, base_url, api_key, api_key_env, timeout)?,
            max_tool_rounds: max_tool_rounds.max(1),
        })
    }

    fn request_body(model: &str, messages: &[Value], settings: &CerebrasSettings, stream: bool) -> Value {
        json!({
            "model": model,
            "messages": messages,
            "temperature": settings.temperature,
            "max_tokens": settings.max_tokens,
            "top_p": settings.top_p,
            "stream": stream,
        })
    }

    fn tool_list(settings: &CerebrasSettings) -> Vec<Value> {
        if settings.tools.is_empty() {
            vec![math_tool_schema()]
        } else {
            settings.tools.clone()
        }
    }

    /// Ask, resolve any tool calls locally, and ask again until the model
    /// answers with plain text
    async fn complete_with_tools(
        &self,
        request: &GenerationRequest,
        settings: &CerebrasSettings,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String> {
        let tools = Self::tool_list(settings);
        let mut messages = request.json_messages();

        for round in 1..=self.max_tool_rounds {
            let mut body = Self::request_body(&request.model, &messages, settings, false);
            body["tools"] = Value::Array(tools.clone());

            let mut message = self.api.chat(&body).await?.into_message()?;
            let tool_calls = message.take_tool_calls();

            if tool_calls.is_empty() {
                let text = message.content.unwrap_or_default();
                if settings.stream && !text.is_empty() {
                    if let Some(callback) = &stream_callback {
                        callback(&text);
                    }
                }
                return Ok(text);
            }

            debug!(round, calls = tool_calls.len(), "Resolving tool calls");
            messages.push(json!({
                "role": "assistant",
                "content": message.content,
                "tool_calls": tool_calls,
            }));
            for call in &tool_calls {
                let result = dispatch_tool_call(&call.function.name, &call.function.arguments);
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": result,
                }));
            }
        }

        anyhow::bail!("no final answer after {} tool rounds", self.max_tool_rounds)
    }
}

#[async_trait]
impl Backend for CerebrasBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cerebras
    }

    async fn complete(
        &self,
        request: &GenerationRequest,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String> {
        let Settings::Cerebras(settings) = &request.settings else {
            anyhow::bail!("{} settings passed to Cerebras", request.settings.backend());
        };

        if settings.use_tools {
            return self.complete_with_tools(request, settings, stream_callback).await;
        }

        let body = Self::request_body(&request.model, &request.json_messages(), settings, settings.stream);
        if settings.stream {
            self.api.chat_stream(&body, stream_callback).await
        } else {
            let message = self.api.chat(&body).await?.into_message()?;
            Ok(message.content.unwrap_or_default())
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        self.api.models().await
    }
}
