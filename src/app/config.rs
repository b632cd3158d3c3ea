use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CEREBRAS_API_KEY_ENV, DEFAULT_CEREBRAS_BASE_URL, DEFAULT_GROQ_BASE_URL, DEFAULT_HTTP_HOST,
    DEFAULT_HTTP_PORT, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_PORT,
    DEFAULT_STORE_FILE, GROQ_API_KEY_ENV, GROQ_FALLBACK_MODELS, HTTP_REQUEST_TIMEOUT_SECS,
};

const APP_NAME: &str = "confab";
const LOCAL_CONFIG: &str = ".confab/config.toml";
const ENV_PREFIX: &str = "CONFAB_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP API server
    #[serde(default)]
    pub server: ServerConfig,

    /// Context persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Limits applied to every backend call
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Cerebras configuration
    #[serde(default = "CloudConfig::cerebras")]
    pub cerebras: CloudConfig,

    /// Groq configuration
    #[serde(default)]
    pub groq: GroqConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Context file; the platform data directory is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Whether autosave starts enabled
    pub autosave: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            autosave: true,
        }
    }
}

impl StoreConfig {
    /// Configured path, or `all_contexts.json` in the data directory
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_data_dir()?.join(DEFAULT_STORE_FILE)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on one backend call, tool rounds included
    pub timeout_secs: u64,
    /// Maximum request/tool-result exchanges per Cerebras turn
    pub max_tool_rounds: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Ollama configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host, scheme included
    pub host: String,
    /// Ollama server port
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            port: DEFAULT_OLLAMA_PORT,
        }
    }
}

/// A hosted OpenAI-compatible service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub base_url: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Explicit key, takes precedence over the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl CloudConfig {
    fn cerebras() -> Self {
        Self {
            base_url: DEFAULT_CEREBRAS_BASE_URL.to_string(),
            api_key_env: CEREBRAS_API_KEY_ENV.to_string(),
            api_key: None,
        }
    }

    fn groq() -> Self {
        Self {
            base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            api_key_env: GROQ_API_KEY_ENV.to_string(),
            api_key: None,
        }
    }

    /// Explicit key, else the named environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self::cerebras()
    }
}

/// Groq configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(flatten)]
    pub api: CloudConfig,
    /// Offered when the models endpoint cannot be reached
    pub fallback_models: Vec<String>,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api: CloudConfig::groq(),
            fallback_models: GROQ_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Load configuration from multiple sources
///
/// Later sources win: defaults, the global config file, the project-local
/// `.confab/config.toml` (or `explicit` instead of both files), then
/// `CONFAB_` environment variables with `__` separating sections.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let global_config = get_config_dir()?.join("config.toml");
            if global_config.exists() {
                figment = figment.merge(Toml::file(&global_config));
            }
            let local_config = PathBuf::from(LOCAL_CONFIG);
            if local_config.exists() {
                figment = figment.merge(Toml::file(&local_config));
            }
        }
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment.extract().context("Failed to load configuration")
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

fn home_fallback(subdir: &str) -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(subdir).join(APP_NAME))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = match project_dirs() {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => home_fallback(".config")?,
    };
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Get the directory holding the context store
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = match project_dirs() {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => home_fallback(".local/share")?,
    };
    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<()> {
    let config_file = get_config_dir()?.join("config.toml");

    if config_file.exists() {
        println!("Configuration already exists at: {}", config_file.display());
    } else {
        save_config(&Config::default(), Some(config_file.clone()))?;
        println!("Created default configuration at: {}", config_file.display());
    }

    let local_example = PathBuf::from(".confab/config.toml.example");
    if !local_example.exists() {
        if let Some(parent) = local_example.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let example_config = r#"# Confab Project Configuration
# This file overrides global settings for this directory

[server]
host = "127.0.0.1"
port = 5000

[store]
path = "all_contexts.json"
autosave = true

[generation]
timeout_secs = 120

[ollama]
host = "http://localhost"
port = 11434
"#;
        std::fs::write(&local_example, example_config)?;
        println!("Created example configuration at: {}", local_example.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.address(), "127.0.0.1:5000");
        assert!(config.store.autosave);
        assert_eq!(config.cerebras.api_key_env, "CEREBRAS_API_KEY");
        assert_eq!(config.groq.api.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.groq.fallback_models.len(), GROQ_FALLBACK_MODELS.len());
        assert_eq!(config.generation.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8080

[store]
autosave = false

[groq]
base_url = "http://localhost:9999"
fallback_models = ["only-model"]
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.store.autosave);
        assert_eq!(config.groq.api.base_url, "http://localhost:9999");
        assert_eq!(config.groq.api.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.groq.fallback_models, vec!["only-model"]);
        assert_eq!(config.ollama, OllamaConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.generation.max_tool_rounds = 2;
        config.store.path = Some(dir.path().join("contexts.json"));

        save_config(&config, Some(path.clone())).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let cloud = CloudConfig {
            api_key: Some("from-config".to_string()),
            api_key_env: "CONFAB_TEST_UNSET_KEY_VAR".to_string(),
            ..CloudConfig::groq()
        };
        assert_eq!(cloud.api_key().as_deref(), Some("from-config"));

        let blank = CloudConfig {
            api_key: Some("  ".to_string()),
            api_key_env: "CONFAB_TEST_UNSET_KEY_VAR".to_string(),
            ..CloudConfig::groq()
        };
        assert_eq!(blank.api_key(), None);
    }
}
