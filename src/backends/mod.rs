// Gateway module for backends - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod cerebras;
mod factory;
mod groq;
mod ollama;
mod openai;
mod settings;
mod stream;
mod tools;
mod traits;
mod types;

// Public re-exports - the ONLY way to access backend functionality
pub use cerebras::CerebrasBackend;
pub use factory::BackendRegistry;
pub use groq::GroqBackend;
pub use ollama::OllamaBackend;
pub use settings::{
    CerebrasSettings, GroqSettings, OllamaSettings, ResponseFormat, Settings, SettingsError,
};
pub use tools::{dispatch_tool_call, math_tool_schema, perform_math_operation, MATH_TOOL_NAME};
pub use traits::Backend;
pub use types::{
    BackendKind, ChatMessage, GenerationRequest, MessageRole, StreamCallback, UnknownBackend,
};

#[cfg(test)]
pub use traits::MockBackend;
