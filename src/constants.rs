/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const DEFAULT_CEREBRAS_BASE_URL: &str = "https://api.cerebras.ai/v1";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const CEREBRAS_API_KEY_ENV: &str = "CEREBRAS_API_KEY";
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 600; // 10 minutes for large model requests
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const MODEL_LIST_TIMEOUT_SECS: u64 = 10;

// Tool calling
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

// Storage
pub const DEFAULT_STORE_FILE: &str = "all_contexts.json";

// Context listing
pub const SUMMARY_PROMPT_CHARS: usize = 50;

// Console
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

// Cerebras defaults
pub const CEREBRAS_DEFAULT_TEMPERATURE: f32 = 0.7;
pub const CEREBRAS_DEFAULT_MAX_TOKENS: u32 = 150;
pub const CEREBRAS_DEFAULT_TOP_P: f32 = 1.0;

// Groq defaults
pub const GROQ_DEFAULT_TEMPERATURE: f32 = 0.7;
pub const GROQ_DEFAULT_MAX_TOKENS: u32 = 150;
pub const GROQ_DEFAULT_TOP_P: f32 = 1.0;

// Ollama defaults
pub const OLLAMA_DEFAULT_NUM_PREDICT: i32 = 128;
pub const OLLAMA_DEFAULT_TEMPERATURE: f32 = 0.7;
pub const OLLAMA_DEFAULT_TOP_K: u32 = 40;
pub const OLLAMA_DEFAULT_TOP_P: f32 = 0.9;
pub const OLLAMA_DEFAULT_REPEAT_PENALTY: f32 = 1.1;

// Used when the Groq models endpoint cannot be reached
pub const GROQ_FALLBACK_MODELS: &[&str] = &[
    "llama3-groq-70b-8192-tool-use-preview",
    "llama3-groq-8b-8192-tool-use-preview",
    "llama-3.1-70b-versatile",
    "llama-3.1-8b-instant",
    "llama-3.2-1b-preview",
    "llama-3.2-3b-preview",
    "llama3-70b-8192",
    "llama3-8b-8192",
];
