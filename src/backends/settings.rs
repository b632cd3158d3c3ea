use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::types::BackendKind;
use crate::constants::{
    CEREBRAS_DEFAULT_MAX_TOKENS, CEREBRAS_DEFAULT_TEMPERATURE, CEREBRAS_DEFAULT_TOP_P,
    GROQ_DEFAULT_MAX_TOKENS, GROQ_DEFAULT_TEMPERATURE, GROQ_DEFAULT_TOP_P,
    OLLAMA_DEFAULT_NUM_PREDICT, OLLAMA_DEFAULT_REPEAT_PENALTY, OLLAMA_DEFAULT_TEMPERATURE,
    OLLAMA_DEFAULT_TOP_K, OLLAMA_DEFAULT_TOP_P,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SettingsError {
    #[error("Invalid {backend} settings: {reason}")]
    Invalid { backend: BackendKind, reason: String },

    #[error("{found} settings cannot be used with a {expected} context")]
    Mismatch {
        expected: BackendKind,
        found: BackendKind,
    },
}

/// Generation parameters for Cerebras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CerebrasSettings {
    pub stream: bool,
    pub use_tools: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Tool schemas in OpenAI function format; the math tool is used when empty
    pub tools: Vec<Value>,
}

impl Default for CerebrasSettings {
    fn default() -> Self {
        Self {
            stream: false,
            use_tools: false,
            temperature: CEREBRAS_DEFAULT_TEMPERATURE,
            max_tokens: CEREBRAS_DEFAULT_MAX_TOKENS,
            top_p: CEREBRAS_DEFAULT_TOP_P,
            tools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

impl ResponseFormat {
    /// Value for the `response_format` request field
    pub fn to_request_value(self) -> Value {
        match self {
            ResponseFormat::Text => json!({ "type": "text" }),
            ResponseFormat::JsonObject => json!({ "type": "json_object" }),
        }
    }
}

/// Generation parameters for Groq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroqSettings {
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub response_format: Option<ResponseFormat>,
}

impl Default for GroqSettings {
    fn default() -> Self {
        Self {
            stream: false,
            temperature: GROQ_DEFAULT_TEMPERATURE,
            max_tokens: GROQ_DEFAULT_MAX_TOKENS,
            top_p: GROQ_DEFAULT_TOP_P,
            response_format: None,
        }
    }
}

/// Generation parameters for a local Ollama server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OllamaSettings {
    pub stream: bool,
    pub num_predict: i32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            stream: false,
            num_predict: OLLAMA_DEFAULT_NUM_PREDICT,
            temperature: OLLAMA_DEFAULT_TEMPERATURE,
            top_k: OLLAMA_DEFAULT_TOP_K,
            top_p: OLLAMA_DEFAULT_TOP_P,
            repeat_penalty: OLLAMA_DEFAULT_REPEAT_PENALTY,
        }
    }
}

/// A settings bundle for exactly one backend
#[derive(Debug, Clone, PartialEq)]
pub enum Settings {
    Cerebras(CerebrasSettings),
    Groq(GroqSettings),
    Ollama(OllamaSettings),
}

impl Settings {
    /// Default bundle for a backend
    pub fn defaults_for(backend: BackendKind) -> Self {
        match backend {
            BackendKind::Cerebras => Settings::Cerebras(CerebrasSettings::default()),
            BackendKind::Groq => Settings::Groq(GroqSettings::default()),
            BackendKind::Ollama => Settings::Ollama(OllamaSettings::default()),
        }
    }

    /// The backend this bundle belongs to
    pub fn backend(&self) -> BackendKind {
        match self {
            Settings::Cerebras(_) => BackendKind::Cerebras,
            Settings::Groq(_) => BackendKind::Groq,
            Settings::Ollama(_) => BackendKind::Ollama,
        }
    }

    pub fn stream(&self) -> bool {
        match self {
            Settings::Cerebras(s) => s.stream,
            Settings::Groq(s) => s.stream,
            Settings::Ollama(s) => s.stream,
        }
    }

    /// Build a bundle from a flat field map.
    ///
    /// Missing fields keep their defaults. Unknown or mistyped fields are rejected.
    /// `null` yields the default bundle.
    pub fn from_fields(backend: BackendKind, fields: Value) -> Result<Self, SettingsError> {
        if fields.is_null() {
            return Ok(Self::defaults_for(backend));
        }
        if !fields.is_object() {
            return Err(SettingsError::Invalid {
                backend,
                reason: "expected a map of setting names to values".to_string(),
            });
        }

        match backend {
            BackendKind::Cerebras => parse_bundle(backend, fields).map(Settings::Cerebras),
            BackendKind::Groq => parse_bundle(backend, fields).map(Settings::Groq),
            BackendKind::Ollama => parse_bundle(backend, fields).map(Settings::Ollama),
        }
    }

    /// Flat field map, the persisted form
    pub fn to_fields(&self) -> Value {
        let fields = match self {
            Settings::Cerebras(s) => serde_json::to_value(s),
            Settings::Groq(s) => serde_json::to_value(s),
            Settings::Ollama(s) => serde_json::to_value(s),
        };
        // Plain structs of scalars and JSON values always serialize
        fields.unwrap_or(Value::Null)
    }

    /// Fail unless this bundle belongs to `backend`
    pub fn ensure_backend(&self, backend: BackendKind) -> Result<(), SettingsError> {
        if self.backend() == backend {
            Ok(())
        } else {
            Err(SettingsError::Mismatch {
                expected: backend,
                found: self.backend(),
            })
        }
    }
}

fn parse_bundle<T: DeserializeOwned>(backend: BackendKind, fields: Value) -> Result<T, SettingsError> {
    serde_json::from_value(fields).map_err(|e| SettingsError::Invalid {
        backend,
        reason: e.to_string(),
    })
}
