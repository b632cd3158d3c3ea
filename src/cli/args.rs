use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::app::Config;

#[derive(Parser, Debug)]
#[command(name = "confab")]
#[command(version)]
#[command(about = "Named, persistent LLM conversations over Cerebras, Groq and Ollama", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Context store file
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Start with autosave disabled
    #[arg(long)]
    pub no_autosave: bool,

    /// Host for the HTTP API
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the HTTP API
    #[arg(long)]
    pub port: Option<u16>,

    /// Ollama server host, scheme included
    #[arg(long, env = "OLLAMA_HOST")]
    pub ollama_host: Option<String>,

    /// Ollama server port
    #[arg(long, env = "OLLAMA_PORT")]
    pub ollama_port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Command-line flags win over every config source
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(store) = &self.store {
            config.store.path = Some(store.clone());
        }
        if self.no_autosave {
            config.store.autosave = false;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.ollama_host {
            config.ollama.host = host.clone();
        }
        if let Some(port) = self.ollama_port {
            config.ollama.port = port;
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// List the models a backend offers (all backends when omitted)
    Models {
        backend: Option<String>,
    },
    /// Show configuration, store and backend status
    Status,
    /// Run only the HTTP API
    Serve,
    /// Run the interactive console (default)
    Console {
        /// Don't start the HTTP API alongside the console
        #[arg(long)]
        no_server: bool,
    },
    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "confab",
            "--port",
            "8081",
            "--store",
            "/tmp/contexts.json",
            "--no-autosave",
            "--ollama-host",
            "http://gpu-box",
            "console",
            "--no-server",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/contexts.json")));
        assert!(!config.store.autosave);
        assert_eq!(config.ollama.host, "http://gpu-box");
        assert_eq!(cli.command, Some(Commands::Console { no_server: true }));
    }

    #[test]
    fn test_models_subcommand() {
        let cli = Cli::parse_from(["confab", "models", "groq"]);
        assert_eq!(
            cli.command,
            Some(Commands::Models {
                backend: Some("groq".to_string())
            })
        );
    }
}
