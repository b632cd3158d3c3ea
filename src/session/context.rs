use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::{BackendKind, ChatMessage, MessageRole, Settings, SettingsError};
use crate::constants::SUMMARY_PROMPT_CHARS;

/// One named, persistent conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    pub settings: Settings,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Context {
    /// Create a context whose history starts with the system prompt
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        settings: Settings,
    ) -> Self {
        let system_prompt = system_prompt.into();
        let now = Utc::now();
        Self {
            name: name.into(),
            model: model.into(),
            history: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    /// The backend is whatever the settings bundle belongs to
    pub fn backend(&self) -> BackendKind {
        self.settings.backend()
    }

    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.history.push(ChatMessage::new(role, content));
        self.updated_at = Utc::now();
    }

    /// Independent copy under a new name.
    ///
    /// With `keep_last_n`, history becomes the first entry followed by the last
    /// `n` entries; when `n` reaches back to the start the first entry appears twice.
    pub fn copy_as(&self, new_name: impl Into<String>, keep_last_n: Option<usize>) -> Self {
        let history = match keep_last_n {
            None => self.history.clone(),
            Some(n) => {
                let mut kept = Vec::with_capacity(n + 1);
                kept.extend(self.history.first().cloned());
                let start = self.history.len().saturating_sub(n);
                kept.extend_from_slice(&self.history[start..]);
                kept
            }
        };

        let now = Utc::now();
        Self {
            name: new_name.into(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            settings: self.settings.clone(),
            history,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_record(&self) -> ContextRecord {
        ContextRecord {
            name: self.name.clone(),
            backend: self.backend(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            settings: self.settings.to_fields(),
            history: self.history.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuild from a stored record, validating its settings against its backend
    pub fn from_record(record: ContextRecord) -> Result<Self, SettingsError> {
        let settings = Settings::from_fields(record.backend, record.settings)?;
        Ok(Self {
            name: record.name,
            model: record.model,
            system_prompt: record.system_prompt,
            settings,
            history: record.history,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Persisted form of a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub name: String,
    pub backend: BackendKind,
    pub model: String,
    pub system_prompt: String,
    /// Flat field map of the backend's settings bundle
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Listing entry for a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub name: String,
    pub backend: BackendKind,
    pub model: String,
    /// System prompt cut to a preview
    pub system_prompt: String,
    pub message_count: usize,
}

/// System prompt preview: the first 50 characters, then `...` if cut
pub(super) fn truncate_prompt(prompt: &str) -> String {
    if prompt.chars().count() > SUMMARY_PROMPT_CHARS {
        let preview: String = prompt.chars().take(SUMMARY_PROMPT_CHARS).collect();
        format!("{}...", preview)
    } else {
        prompt.to_string()
    }
}
