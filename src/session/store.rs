use anyhow::{Context as _, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::context::{Context, ContextRecord};

/// On-disk document: every context record keyed by name
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    contexts: Map<String, Value>,
}

/// Durable name → context mapping backed by one JSON file
pub struct ContextStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl ContextStore {
    /// Open a store at `path`, creating the parent directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {}", parent.display()))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every valid context. Records that fail to parse are skipped with
    /// a warning; an unreadable document is an error.
    pub fn load_all(&self) -> Result<Vec<Context>> {
        let _guard = self.write_lock.lock();
        let document = self.read_document()?;

        let mut contexts = Vec::with_capacity(document.contexts.len());
        for (name, value) in document.contexts {
            let record = match serde_json::from_value::<ContextRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(context = %name, "Skipping unreadable context record: {}", e);
                    continue;
                }
            };
            if record.name != name {
                warn!(context = %name, stored_name = %record.name, "Record name differs from its key, using the key");
            }
            match Context::from_record(ContextRecord { name: name.clone(), ..record }) {
                Ok(context) => contexts.push(context),
                Err(e) => warn!(context = %name, "Skipping context with invalid settings: {}", e),
            }
        }

        debug!(path = %self.path.display(), count = contexts.len(), "Loaded contexts");
        Ok(contexts)
    }

    /// Insert or replace one context's record
    pub fn upsert(&self, context: &Context) -> Result<()> {
        let record = serde_json::to_value(context.to_record())?;

        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        document.contexts.insert(context.name.clone(), record);
        self.write_document(&document)
    }

    /// Remove a record; returns whether it was present
    pub fn remove(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        let removed = document.contexts.remove(name).is_some();
        if removed {
            self.write_document(&document)?;
        }
        Ok(removed)
    }

    fn read_document(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read context store {}", self.path.display()))?;
        if json.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        serde_json::from_str(&json)
            .with_context(|| format!("Context store {} is corrupt", self.path.display()))
    }

    /// Write to a sibling temp file and rename over the store
    fn write_document(&self, document: &StoreDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendKind, GroqSettings, MessageRole, ResponseFormat, Settings};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, ContextStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::open(dir.path().join("nested").join("contexts.json")).unwrap();
        (dir, store)
    }

    fn groq_context(name: &str) -> Context {
        let settings = Settings::Groq(GroqSettings {
            response_format: Some(ResponseFormat::JsonObject),
            max_tokens: 512,
            ..GroqSettings::default()
        });
        let mut ctx = Context::new(name, "llama3-70b-8192", "You narrate.", settings);
        ctx.add_message(MessageRole::User, "hello");
        ctx.add_message(MessageRole::Assistant, "{\"narration\":\"hi\"}");
        ctx
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let (_dir, store) = store();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_and_reload() {
        let (_dir, store) = store();
        let ctx = groq_context("quest");
        store.upsert(&ctx).unwrap();

        let reopened = ContextStore::open(store.path()).unwrap();
        let loaded = reopened.load_all().unwrap();
        assert_eq!(loaded, vec![ctx]);
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let (_dir, store) = store();
        let mut ctx = groq_context("quest");
        store.upsert(&ctx).unwrap();
        ctx.add_message(MessageRole::User, "again");
        store.upsert(&ctx).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].history.len(), 4);
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = store();
        store.upsert(&groq_context("a")).unwrap();
        store.upsert(&groq_context("b")).unwrap();

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        let names: Vec<_> = store.load_all().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_bad_records_are_skipped_and_kept_on_disk() {
        let (_dir, store) = store();
        fs::write(
            store.path(),
            r#"{"contexts": {
                "broken": {"name": "broken"},
                "wrong": {"name": "wrong", "backend": "ollama", "model": "m", "system_prompt": "s", "settings": {"use_tools": true}},
                "ok": {"name": "ok", "backend": "cerebras", "model": "llama3.1-8b", "system_prompt": "s",
                       "history": [{"role": "system", "content": "s"}]}
            }}"#,
        )
        .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "ok");
        assert_eq!(loaded[0].backend(), BackendKind::Cerebras);
        assert_eq!(loaded[0].settings, Settings::defaults_for(BackendKind::Cerebras));

        store.upsert(&groq_context("new")).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw["contexts"].get("broken").is_some());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let (_dir, store) = store();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load_all().is_err());
    }
}
