use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use super::types::{BackendKind, GenerationRequest, StreamCallback};

/// Core trait that all generation backends must implement
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which backend variant this adapter serves
    fn kind(&self) -> BackendKind;

    /// Send the conversation and return the complete assistant text.
    ///
    /// When the request's settings ask for streaming, fragments are passed to
    /// `stream_callback` in arrival order and the concatenation is returned.
    async fn complete(
        &self,
        request: &GenerationRequest,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String>;

    /// Model identifiers offered by the service
    async fn fetch_models(&self) -> Result<Vec<String>>;
}

impl<'a> dyn Backend + 'a {
    /// Generate the next assistant message without ever failing.
    ///
    /// Transport errors and timeouts come back as the backend's error sentinel
    /// (`"<Backend> Error: <detail>"`) so the turn can still be recorded.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        stream_callback: Option<StreamCallback>,
        timeout: Duration,
    ) -> String {
        let kind = self.kind();
        match tokio::time::timeout(timeout, self.complete(request, stream_callback)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(backend = %kind, model = %request.model, "Generation failed: {:#}", e);
                kind.error_text(format!("{:#}", e))
            }
            Err(_) => {
                warn!(backend = %kind, model = %request.model, "Generation timed out");
                kind.error_text(format!("request timed out after {}s", timeout.as_secs()))
            }
        }
    }

    /// Best-effort model listing; empty on failure
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(backend = %self.kind(), "Failed to list models: {:#}", e);
                Vec::new()
            }
        }
    }
}
