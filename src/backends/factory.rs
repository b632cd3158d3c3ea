use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::cerebras::CerebrasBackend;
use super::groq::GroqBackend;
use super::ollama::OllamaBackend;
use super::traits::Backend;
use super::types::BackendKind;
use crate::app::Config;

/// The one place a backend tag is turned into an adapter
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build all three adapters from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.generation.timeout();

        let cerebras = CerebrasBackend::new(
            &config.cerebras.base_url,
            config.cerebras.api_key(),
            &config.cerebras.api_key_env,
            config.generation.max_tool_rounds,
            timeout,
        )?;
        let groq = GroqBackend::new(
            &config.groq.api.base_url,
            config.groq.api.api_key(),
            &config.groq.api.api_key_env,
            config.groq.fallback_models.clone(),
            timeout,
        )?;
        let ollama = OllamaBackend::new(&config.ollama.host, config.ollama.port, timeout)?;
        debug!(ollama = ollama.base_url(), "Backends configured");

        Ok(Self::new().with(cerebras).with(groq).with(ollama))
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, backend: impl Backend + 'static) -> Self {
        self.register(Arc::new(backend));
        self
    }

    /// Register an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn Backend>> {
        self.backends.get(&kind).cloned()
    }

    /// Registered kinds in declaration order
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.backends.contains_key(kind))
            .collect()
    }
}
