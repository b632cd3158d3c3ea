use anyhow::{Context as _, Result};
use std::sync::Arc;

use crate::app::Config;
use crate::backends::BackendRegistry;
use crate::session::{ContextManager, ContextStore, ManagerOptions};

/// Shared application state, handed to both the console and the HTTP server
#[derive(Clone)]
pub struct AppState {
    /// The single owner of every context
    pub manager: Arc<ContextManager>,
}

impl AppState {
    /// Open the store, build the backends and load every context
    pub fn build(config: Config) -> Result<Self> {
        let store_path = config.store.resolved_path()?;
        let store = ContextStore::open(&store_path)?;
        let backends = BackendRegistry::from_config(&config)?;
        let options = ManagerOptions {
            autosave: config.store.autosave,
            generation_timeout: config.generation.timeout(),
        };
        let manager = ContextManager::load(Arc::new(store), backends, options)
            .with_context(|| format!("Failed to load contexts from {}", store_path.display()))?;

        Ok(Self::new(manager))
    }

    pub fn new(manager: ContextManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
