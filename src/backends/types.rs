use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use super::settings::Settings;

/// The generation services a context can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    /// Cloud backend with tool calling
    Cerebras,
    /// Cloud backend with JSON mode
    Groq,
    /// Local Ollama server
    Ollama,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Cerebras, BackendKind::Groq, BackendKind::Ollama];

    /// Lowercase tag used in storage, on the wire and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cerebras => "cerebras",
            BackendKind::Groq => "groq",
            BackendKind::Ollama => "ollama",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Cerebras => "Cerebras",
            BackendKind::Groq => "Groq",
            BackendKind::Ollama => "Ollama",
        }
    }

    /// Sentinel text returned in place of a failed generation
    pub fn error_text(&self, detail: impl fmt::Display) -> String {
        format!("{} Error: {}", self.display_name(), detail)
    }

    /// Check whether a response is this backend's error sentinel
    pub fn is_error_text(&self, text: &str) -> bool {
        text.starts_with(&format!("{} Error: ", self.display_name()))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown backend '{0}'. Choose cerebras, groq or ollama.")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cerebras" => Ok(BackendKind::Cerebras),
            "groq" => Ok(BackendKind::Groq),
            "ollama" => Ok(BackendKind::Ollama),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = UnknownBackend;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Everything a backend needs to produce the next assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub history: Vec<ChatMessage>,
    pub settings: Settings,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, history: Vec<ChatMessage>, settings: Settings) -> Self {
        Self {
            model: model.into(),
            history,
            settings,
        }
    }

    /// History in the OpenAI-style `{role, content}` shape shared by all three services
    pub fn json_messages(&self) -> Vec<serde_json::Value> {
        self.history
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })
            })
            .collect()
    }
}

/// Stream callback type for real-time response streaming
pub type StreamCallback = Arc<dyn Fn(&str) + Send + Sync>;
