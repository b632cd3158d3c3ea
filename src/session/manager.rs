use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::context::{truncate_prompt, Context, ContextSummary};
use super::store::ContextStore;
use crate::backends::{
    Backend, BackendKind, BackendRegistry, GenerationRequest, MessageRole, Settings, StreamCallback,
};
use crate::constants::HTTP_REQUEST_TIMEOUT_SECS;
use crate::utils::ManagerError;

/// Startup knobs for [`ContextManager`]
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Initial autosave state
    pub autosave: bool,
    /// Upper bound on a single backend call
    pub generation_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            autosave: true,
            generation_timeout: Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Outcome of a mutating operation that produces no text
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub message: String,
    /// Set when the change is in memory but could not be persisted
    pub warning: Option<String>,
}

/// Outcome of a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct PromptReply {
    /// Assistant text; may be a backend error sentinel
    pub response: String,
    pub warning: Option<String>,
}

/// Result of a completed turn after the caller's acceptance check
pub(crate) struct TurnOutcome<T> {
    pub response: String,
    pub value: T,
    pub warning: Option<String>,
}

/// One loaded context. The identity fields never change after creation so
/// listings can be served without waiting on a turn in progress.
struct Entry {
    backend: BackendKind,
    model: String,
    system_prompt: String,
    message_count: AtomicUsize,
    context: Mutex<Context>,
}

impl Entry {
    fn new(context: Context) -> Arc<Self> {
        Arc::new(Self {
            backend: context.backend(),
            model: context.model.clone(),
            system_prompt: context.system_prompt.clone(),
            message_count: AtomicUsize::new(context.history.len()),
            context: Mutex::new(context),
        })
    }

    fn sync_count(&self, context: &Context) {
        self.message_count.store(context.history.len(), Ordering::Relaxed);
    }

    fn summary(&self, name: &str) -> ContextSummary {
        ContextSummary {
            name: name.to_string(),
            backend: self.backend,
            model: self.model.clone(),
            system_prompt: truncate_prompt(&self.system_prompt),
            message_count: self.message_count.load(Ordering::Relaxed),
        }
    }
}

/// Owns every loaded context and mediates all access to them.
///
/// Each context sits behind its own async mutex, so operations on one name run
/// one at a time while different names proceed independently. The name map's
/// lock is only held for lookups and insert/remove, never across a backend call.
/// Lock order is always context first, then map; the only exception is a
/// fresh context locked before it is published.
pub struct ContextManager {
    contexts: RwLock<BTreeMap<String, Arc<Entry>>>,
    store: Arc<ContextStore>,
    backends: BackendRegistry,
    autosave_enabled: AtomicBool,
    generation_timeout: Duration,
}

impl ContextManager {
    /// Load every stored context and take ownership of them
    pub fn load(
        store: Arc<ContextStore>,
        backends: BackendRegistry,
        options: ManagerOptions,
    ) -> anyhow::Result<Self> {
        let contexts: BTreeMap<_, _> = store
            .load_all()?
            .into_iter()
            .map(|context| (context.name.clone(), Entry::new(context)))
            .collect();
        info!(count = contexts.len(), path = %store.path().display(), "Contexts loaded");

        Ok(Self {
            contexts: RwLock::new(contexts),
            store,
            backends,
            autosave_enabled: AtomicBool::new(options.autosave),
            generation_timeout: options.generation_timeout,
        })
    }

    pub fn autosave_enabled(&self) -> bool {
        self.autosave_enabled.load(Ordering::SeqCst)
    }

    pub fn set_autosave(&self, enabled: bool) {
        self.autosave_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Autosave updated");
    }

    /// Flip autosave and return the new state
    pub fn toggle_autosave(&self) -> bool {
        let enabled = !self.autosave_enabled.fetch_xor(true, Ordering::SeqCst);
        info!(enabled, "Autosave toggled");
        enabled
    }

    /// Persist one context if autosave is on. A failed write is logged and
    /// returned as a warning; memory is left as it is.
    fn autosave(&self, context: &Context) -> Option<String> {
        if !self.autosave_enabled() {
            return None;
        }
        match self.store.upsert(context) {
            Ok(()) => {
                debug!(context = %context.name, "Autosaved");
                None
            }
            Err(e) => {
                warn!(context = %context.name, "Autosave failed: {:#}", e);
                Some(format!("Context '{}' could not be saved: {:#}", context.name, e))
            }
        }
    }

    pub async fn create_context(
        &self,
        name: &str,
        backend: BackendKind,
        model: &str,
        system_prompt: &str,
        settings: Settings,
    ) -> Result<Ack, ManagerError> {
        if name.trim().is_empty() {
            return Err(ManagerError::InvalidName);
        }
        settings.ensure_backend(backend)?;

        let mut contexts = self.contexts.write().await;
        if contexts.contains_key(name) {
            return Err(ManagerError::AlreadyExists(name.to_string()));
        }

        let entry = Entry::new(Context::new(name, model, system_prompt, settings));
        let context = entry.context.lock().await;
        contexts.insert(name.to_string(), entry.clone());
        drop(contexts);

        // Persist outside the map lock; the new context's own lock keeps
        // other operations on it waiting until the write is done
        let warning = self.autosave(&context);
        info!(context = name, %backend, model, "Context created");

        Ok(Ack {
            message: format!("Context '{}' created successfully.", name),
            warning,
        })
    }

    /// Summaries of every context, ordered by name
    pub async fn list_contexts(&self) -> Vec<ContextSummary> {
        let contexts = self.contexts.read().await;
        contexts.iter().map(|(name, entry)| entry.summary(name)).collect()
    }

    pub async fn context_names(&self) -> Vec<String> {
        self.contexts.read().await.keys().cloned().collect()
    }

    /// A copy of the context as it is now
    pub async fn get_context(&self, name: &str) -> Result<Context, ManagerError> {
        let entry = self.entry(name).await?;
        let context = entry.context.lock().await;
        self.ensure_current(name, &entry).await?;
        Ok(context.clone())
    }

    pub async fn delete_context(&self, name: &str) -> Result<Ack, ManagerError> {
        let entry = self.entry(name).await?;
        // Waits for any turn in progress on this context
        let _context = entry.context.lock().await;

        let mut contexts = self.contexts.write().await;
        match contexts.get(name) {
            Some(current) if Arc::ptr_eq(current, &entry) => {
                contexts.remove(name);
            }
            _ => return Err(ManagerError::NotFound(name.to_string())),
        }

        let warning = match self.store.remove(name) {
            Ok(_) => None,
            Err(e) => {
                warn!(context = name, "Failed to remove context from store: {:#}", e);
                Some(format!("Context '{}' could not be removed from storage: {:#}", name, e))
            }
        };
        info!(context = name, "Context deleted");

        Ok(Ack {
            message: format!("Context '{}' deleted.", name),
            warning,
        })
    }

    /// Copy `source` to `new_name`, optionally keeping only the system
    /// message plus the last `keep_last_n` entries
    pub async fn copy_context(
        &self,
        source: &str,
        new_name: &str,
        keep_last_n: Option<usize>,
    ) -> Result<Ack, ManagerError> {
        if new_name.trim().is_empty() {
            return Err(ManagerError::InvalidName);
        }

        let entry = self.entry(source).await?;
        let source_context = entry.context.lock().await;

        let mut contexts = self.contexts.write().await;
        match contexts.get(source) {
            Some(current) if Arc::ptr_eq(current, &entry) => {}
            _ => return Err(ManagerError::NotFound(source.to_string())),
        }
        if contexts.contains_key(new_name) {
            return Err(ManagerError::AlreadyExists(new_name.to_string()));
        }

        let copy = Entry::new(source_context.copy_as(new_name, keep_last_n));
        let copied = copy.context.lock().await;
        contexts.insert(new_name.to_string(), copy.clone());
        drop(contexts);
        drop(source_context);

        let warning = self.autosave(&copied);
        info!(source, context = new_name, ?keep_last_n, "Context copied");

        Ok(Ack {
            message: format!("Context '{}' copied from '{}'.", new_name, source),
            warning,
        })
    }

    /// Send a user prompt and record the reply.
    ///
    /// Backend failures come back as error-sentinel text and count as a
    /// completed turn. Only an empty reply is a failure, and then the user
    /// message stays in history unsaved.
    pub async fn send_prompt(
        &self,
        name: &str,
        prompt: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<PromptReply, ManagerError> {
        let outcome = self
            .run_turn(name, None, prompt, stream_callback, |_| Ok(()))
            .await?;
        Ok(PromptReply {
            response: outcome.response,
            warning: outcome.warning,
        })
    }

    /// Model identifiers the backend offers; empty when it cannot be reached
    pub async fn list_models(&self, backend: BackendKind) -> Result<Vec<String>, ManagerError> {
        let adapter = self
            .backends
            .get(backend)
            .ok_or(ManagerError::BackendUnavailable(backend))?;
        Ok(adapter.list_models().await)
    }

    /// One locked turn: optional extra system message, the user message, the
    /// backend call, then `accept` on the reply. The assistant message is only
    /// appended and saved when `accept` succeeds.
    pub(crate) async fn run_turn<T, F>(
        &self,
        name: &str,
        preamble: Option<&str>,
        prompt: &str,
        stream_callback: Option<StreamCallback>,
        accept: F,
    ) -> Result<TurnOutcome<T>, ManagerError>
    where
        F: FnOnce(&str) -> Result<T, ManagerError> + Send,
        T: Send,
    {
        let entry = self.entry(name).await?;
        let mut context = entry.context.lock().await;
        self.ensure_current(name, &entry).await?;

        let backend: Arc<dyn Backend> = self
            .backends
            .get(context.backend())
            .ok_or(ManagerError::BackendUnavailable(context.backend()))?;

        if let Some(preamble) = preamble {
            context.add_message(MessageRole::System, preamble);
        }
        context.add_message(MessageRole::User, prompt);
        entry.sync_count(&context);

        let request = GenerationRequest::new(
            context.model.clone(),
            context.history.clone(),
            context.settings.clone(),
        );
        debug!(context = name, backend = %context.backend(), messages = request.history.len(), "Dispatching prompt");
        let response = backend
            .generate(&request, stream_callback, self.generation_timeout)
            .await;

        if response.is_empty() {
            warn!(context = name, "Backend returned an empty response");
            return Err(ManagerError::GenerationFailed(name.to_string()));
        }

        let value = accept(&response)?;

        context.add_message(MessageRole::Assistant, response.clone());
        entry.sync_count(&context);
        let warning = self.autosave(&context);

        Ok(TurnOutcome {
            response,
            value,
            warning,
        })
    }

    async fn entry(&self, name: &str) -> Result<Arc<Entry>, ManagerError> {
        self.contexts
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))
    }

    /// Fail if the entry was deleted while we waited for its lock
    async fn ensure_current(&self, name: &str, entry: &Arc<Entry>) -> Result<(), ManagerError> {
        match self.contexts.read().await.get(name) {
            Some(current) if Arc::ptr_eq(current, entry) => Ok(()),
            _ => Err(ManagerError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::backends::MockBackend;
    use tempfile::TempDir;

    pub struct Harness {
        pub dir: TempDir,
        pub manager: ContextManager,
    }

    impl Harness {
        pub fn store_path(&self) -> std::path::PathBuf {
            self.dir.path().join("contexts.json")
        }

        /// Everything a fresh process would load from disk
        pub fn reload(&self) -> Vec<Context> {
            ContextStore::open(self.store_path()).unwrap().load_all().unwrap()
        }
    }

    pub fn harness_with(backend: impl Backend + 'static) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContextStore::open(dir.path().join("contexts.json")).unwrap());
        let manager = ContextManager::load(
            store,
            BackendRegistry::new().with(backend),
            ManagerOptions::default(),
        )
        .unwrap();
        Harness { dir, manager }
    }

    /// Ollama-kind mock that answers every prompt with `reply`
    pub fn replying(reply: &'static str) -> MockBackend {
        let mut mock = MockBackend::new();
        mock.expect_kind().return_const(BackendKind::Ollama);
        mock.expect_complete().returning(move |_, _| Ok(reply.to_string()));
        mock
    }

    pub async fn create_ollama(manager: &ContextManager, name: &str) {
        manager
            .create_context(name, BackendKind::Ollama, "llama3", "sys", Settings::defaults_for(BackendKind::Ollama))
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::backends::{ChatMessage, MockBackend, OllamaSettings};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn roles(context: &Context) -> Vec<MessageRole> {
        context.history.iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let h = harness_with(replying("ok"));
        let ack = h
            .manager
            .create_context("alpha", BackendKind::Ollama, "llama3", "Be kind.", Settings::defaults_for(BackendKind::Ollama))
            .await
            .unwrap();
        assert_eq!(ack.message, "Context 'alpha' created successfully.");
        assert_eq!(ack.warning, None);

        let listed = h.manager.list_contexts().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "alpha");
        assert_eq!(listed[0].backend, BackendKind::Ollama);
        assert_eq!(listed[0].message_count, 1);

        let ctx = h.manager.get_context("alpha").await.unwrap();
        assert_eq!(ctx.history, vec![ChatMessage::system("Be kind.")]);
        assert_eq!(h.reload().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_existing_untouched() {
        let h = harness_with(replying("first reply"));
        create_ollama(&h.manager, "alpha").await;
        h.manager.send_prompt("alpha", "hello", None).await.unwrap();

        let err = h
            .manager
            .create_context("alpha", BackendKind::Ollama, "other", "different", Settings::defaults_for(BackendKind::Ollama))
            .await
            .unwrap_err();
        assert_eq!(err, ManagerError::AlreadyExists("alpha".to_string()));

        let ctx = h.manager.get_context("alpha").await.unwrap();
        assert_eq!(ctx.model, "llama3");
        assert_eq!(ctx.history.len(), 3);
    }

    #[tokio::test]
    async fn test_create_validates_name_and_settings() {
        let h = harness_with(replying("ok"));
        assert_eq!(
            h.manager
                .create_context("  ", BackendKind::Ollama, "m", "s", Settings::defaults_for(BackendKind::Ollama))
                .await
                .unwrap_err(),
            ManagerError::InvalidName
        );
        let err = h
            .manager
            .create_context("x", BackendKind::Groq, "m", "s", Settings::defaults_for(BackendKind::Ollama))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Settings(_)));
        assert!(h.manager.list_contexts().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_truncated() {
        let h = harness_with(replying("ok"));
        let long_prompt = "p".repeat(80);
        for name in ["zeta", "alpha", "mid"] {
            h.manager
                .create_context(name, BackendKind::Ollama, "m", &long_prompt, Settings::defaults_for(BackendKind::Ollama))
                .await
                .unwrap();
        }
        let listed = h.manager.list_contexts().await;
        let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(listed[0].system_prompt, format!("{}...", "p".repeat(50)));
    }

    #[tokio::test]
    async fn test_send_prompt_appends_and_saves() {
        let h = harness_with(replying("Hello, traveller."));
        create_ollama(&h.manager, "alpha").await;

        let reply = h.manager.send_prompt("alpha", "hi", None).await.unwrap();
        assert_eq!(reply.response, "Hello, traveller.");

        let ctx = h.manager.get_context("alpha").await.unwrap();
        assert_eq!(roles(&ctx), vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]);
        assert_eq!(h.reload()[0].history, ctx.history);
        assert_eq!(h.manager.list_contexts().await[0].message_count, 3);
    }

    #[tokio::test]
    async fn test_send_prompt_to_missing_context() {
        let h = harness_with(replying("ok"));
        assert_eq!(
            h.manager.send_prompt("ghost", "hi", None).await.unwrap_err(),
            ManagerError::NotFound("ghost".to_string())
        );
    }

    #[tokio::test]
    async fn test_transport_error_becomes_conversation_content() {
        let mut mock = MockBackend::new();
        mock.expect_kind().return_const(BackendKind::Ollama);
        mock.expect_complete()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        let h = harness_with(mock);
        create_ollama(&h.manager, "alpha").await;

        let reply = h.manager.send_prompt("alpha", "hi", None).await.unwrap();
        assert_eq!(reply.response, "Ollama Error: connection refused");

        let ctx = h.manager.get_context("alpha").await.unwrap();
        assert_eq!(ctx.history.last(), Some(&ChatMessage::assistant("Ollama Error: connection refused")));
    }

    #[tokio::test]
    async fn test_empty_response_is_generation_failure() {
        let h = harness_with(replying(""));
        create_ollama(&h.manager, "alpha").await;

        let err = h.manager.send_prompt("alpha", "hi", None).await.unwrap_err();
        assert_eq!(err, ManagerError::GenerationFailed("alpha".to_string()));

        // The user message stays in memory only
        let ctx = h.manager.get_context("alpha").await.unwrap();
        assert_eq!(roles(&ctx), vec![MessageRole::System, MessageRole::User]);
        assert_eq!(h.reload()[0].history.len(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_backend() {
        let h = harness_with(replying("ok"));
        h.manager
            .create_context("cloud", BackendKind::Groq, "m", "s", Settings::defaults_for(BackendKind::Groq))
            .await
            .unwrap();

        let err = h.manager.send_prompt("cloud", "hi", None).await.unwrap_err();
        assert_eq!(err, ManagerError::BackendUnavailable(BackendKind::Groq));
        assert_eq!(h.manager.get_context("cloud").await.unwrap().history.len(), 1);
    }

    #[tokio::test]
    async fn test_copy_with_keep_last_n() {
        let h = harness_with(replying("reply"));
        create_ollama(&h.manager, "a").await;
        for prompt in ["u1", "u2", "u3"] {
            h.manager.send_prompt("a", prompt, None).await.unwrap();
        }

        let ack = h.manager.copy_context("a", "b", Some(4)).await.unwrap();
        assert_eq!(ack.message, "Context 'b' copied from 'a'.");

        let b = h.manager.get_context("b").await.unwrap();
        let contents: Vec<_> = b.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "u2", "reply", "u3", "reply"]);
        assert!(h.reload().iter().any(|c| c.name == "b"));
    }

    #[tokio::test]
    async fn test_full_copy_is_independent() {
        let h = harness_with(replying("reply"));
        create_ollama(&h.manager, "a").await;
        h.manager.send_prompt("a", "u1", None).await.unwrap();
        h.manager.copy_context("a", "b", None).await.unwrap();

        let a_before = h.manager.get_context("a").await.unwrap();
        assert_eq!(h.manager.get_context("b").await.unwrap().history, a_before.history);

        h.manager.send_prompt("b", "only b", None).await.unwrap();
        assert_eq!(h.manager.get_context("a").await.unwrap().history, a_before.history);
        assert_eq!(h.manager.get_context("b").await.unwrap().history.len(), 5);
    }

    #[tokio::test]
    async fn test_copy_errors() {
        let h = harness_with(replying("reply"));
        create_ollama(&h.manager, "a").await;
        create_ollama(&h.manager, "b").await;

        assert_eq!(
            h.manager.copy_context("ghost", "c", None).await.unwrap_err(),
            ManagerError::NotFound("ghost".to_string())
        );
        assert_eq!(
            h.manager.copy_context("a", "b", None).await.unwrap_err(),
            ManagerError::AlreadyExists("b".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let h = harness_with(replying("ok"));
        create_ollama(&h.manager, "a").await;
        create_ollama(&h.manager, "b").await;

        assert_eq!(
            h.manager.delete_context("ghost").await.unwrap_err(),
            ManagerError::NotFound("ghost".to_string())
        );
        assert_eq!(h.reload().len(), 2);

        let ack = h.manager.delete_context("a").await.unwrap();
        assert_eq!(ack.message, "Context 'a' deleted.");
        let listed: Vec<_> = h.manager.list_contexts().await.into_iter().map(|s| s.name).collect();
        assert_eq!(listed, vec!["b"]);
        let reloaded: Vec<_> = h.reload().into_iter().map(|c| c.name).collect();
        assert_eq!(reloaded, vec!["b"]);
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let h = harness_with(replying("reply"));
        let settings = Settings::Ollama(OllamaSettings {
            stream: true,
            temperature: 0.2,
            num_predict: 64,
            ..OllamaSettings::default()
        });
        h.manager
            .create_context("a", BackendKind::Ollama, "mistral", "sys", settings.clone())
            .await
            .unwrap();
        h.manager.send_prompt("a", "u1", None).await.unwrap();

        let original = h.manager.get_context("a").await.unwrap();
        let reloaded = h.reload().into_iter().next().unwrap();
        assert_eq!(reloaded.history, original.history);
        assert_eq!(reloaded.settings, settings);
        assert_eq!(reloaded.model, "mistral");
    }

    #[tokio::test]
    async fn test_autosave_toggle() {
        let h = harness_with(replying("reply"));
        create_ollama(&h.manager, "a").await;

        assert!(!h.manager.toggle_autosave());
        h.manager.send_prompt("a", "unsaved", None).await.unwrap();
        assert_eq!(h.manager.get_context("a").await.unwrap().history.len(), 3);
        assert_eq!(h.reload()[0].history.len(), 1);

        h.manager.set_autosave(true);
        assert!(h.manager.autosave_enabled());
        h.manager.send_prompt("a", "saved", None).await.unwrap();
        assert_eq!(h.reload()[0].history.len(), 5);
    }

    #[tokio::test]
    async fn test_autosave_failure_is_a_warning() {
        let h = harness_with(replying("reply"));
        create_ollama(&h.manager, "a").await;
        // A directory where the store file should be makes every write fail
        std::fs::remove_file(h.store_path()).unwrap();
        std::fs::create_dir(h.store_path()).unwrap();

        let reply = h.manager.send_prompt("a", "hi", None).await.unwrap();
        assert_eq!(reply.response, "reply");
        assert!(reply.warning.is_some());
        assert_eq!(h.manager.get_context("a").await.unwrap().history.len(), 3);
    }

    #[tokio::test]
    async fn test_list_models_forwards_to_backend() {
        let mut mock = replying("ok");
        mock.expect_fetch_models()
            .returning(|| Ok(vec!["llama3:latest".to_string()]));
        let h = harness_with(mock);

        assert_eq!(h.manager.list_models(BackendKind::Ollama).await.unwrap(), vec!["llama3:latest"]);
        assert_eq!(
            h.manager.list_models(BackendKind::Groq).await.unwrap_err(),
            ManagerError::BackendUnavailable(BackendKind::Groq)
        );
    }

    /// Records each request's history length and sleeps before answering
    struct SlowEcho;

    #[async_trait]
    impl Backend for SlowEcho {
        fn kind(&self) -> BackendKind {
            BackendKind::Ollama
        }

        async fn complete(
            &self,
            request: &GenerationRequest,
            _: Option<StreamCallback>,
        ) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let last = request.history.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo {}", last))
        }

        async fn fetch_models(&self) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_concurrent_sends_never_interleave() {
        let h = harness_with(SlowEcho);
        create_ollama(&h.manager, "a").await;
        let manager = Arc::new(h.manager);

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.send_prompt("a", &format!("p{i}"), None).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let ctx = manager.get_context("a").await.unwrap();
        assert_eq!(ctx.history.len(), 13);
        for pair in ctx.history[1..].chunks(2) {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[1].content, format!("echo {}", pair[0].content));
        }
    }

    #[tokio::test]
    async fn test_concurrent_creates_and_copies_all_persist() {
        let h = harness_with(SlowEcho);
        create_ollama(&h.manager, "seed").await;
        let manager = Arc::new(h.manager);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        let name = format!("new{i}");
                        create_ollama(&manager, &name).await;
                        manager.send_prompt(&name, "hi", None).await.unwrap();
                    } else {
                        manager.copy_context("seed", &format!("copy{i}"), None).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(manager.context_names().await.len(), 9);
        let store = ContextStore::open(h.dir.path().join("contexts.json")).unwrap();
        let stored = store.load_all().unwrap();
        assert_eq!(stored.len(), 9);
        for ctx in stored.iter().filter(|c| c.name.starts_with("new")) {
            assert_eq!(ctx.history.len(), 3, "{}", ctx.name);
        }
    }

    #[tokio::test]
    async fn test_delete_waits_for_turn_in_progress() {
        let h = harness_with(SlowEcho);
        create_ollama(&h.manager, "a").await;
        let manager = Arc::new(h.manager);

        let sender = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.send_prompt("a", "hi", None).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.delete_context("a").await.unwrap();

        // The send finished first, then the delete removed it everywhere
        assert_eq!(sender.await.unwrap().unwrap().response, "echo hi");
        assert!(manager.list_contexts().await.is_empty());
        assert!(h.dir.path().join("contexts.json").exists());
        let store = ContextStore::open(h.dir.path().join("contexts.json")).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
