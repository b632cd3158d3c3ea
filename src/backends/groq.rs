use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::openai::OpenAiCompatClient;
use super::settings::{GroqSettings, Settings};
use super::traits::Backend;
use super::types::{BackendKind, GenerationRequest, StreamCallback};

/// Groq cloud backend
pub struct GroqBackend {
    api: OpenAiCompatClient,
    fallback_models: Vec<String>,
}

impl GroqBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        api_key_env: &str,
        fallback_models: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api: OpenAiCompatClient::new(BackendKind::Groq, base_url, api_key, api_key_env, timeout)?,
            fallback_models,
        })
    }

    fn request_body(request: &GenerationRequest, settings: &GroqSettings) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.json_messages(),
            "temperature": settings.temperature,
            "max_tokens": settings.max_tokens,
            "top_p": settings.top_p,
            "stream": settings.stream,
        });
        if let Some(format) = settings.response_format {
            body["response_format"] = format.to_request_value();
        }
        body
    }
}

#[async_trait]
impl Backend for GroqBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Groq
    }

    async fn complete(
        &self,
        request: &GenerationRequest,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String> {
        let Settings::Groq(settings) = &request.settings else {
            anyhow::bail!("{} settings passed to Groq", request.settings.backend());
        };
        let body = Self::request_body(request, settings);

        if settings.stream {
            self.api.chat_stream(&body, stream_callback).await
        } else {
            let message = self.api.chat(&body).await?.into_message()?;
            Ok(message.content.unwrap_or_default())
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        match self.api.models().await {
            Ok(models) if !models.is_empty() => Ok(models),
            Ok(_) => Ok(self.fallback_models.clone()),
            Err(e) => {
                debug!("Groq model listing unavailable, using configured list: {:#}", e);
                Ok(self.fallback_models.clone())
            }
        }
    }
}
