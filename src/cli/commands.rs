use anyhow::Result;
use colored::Colorize;

use crate::app::{get_config_dir, init_config, Config};
use crate::backends::{BackendKind, BackendRegistry};
use crate::session::ContextStore;

use super::Commands;

/// Handle the subcommands that finish on their own.
/// Returns false when the caller should go on to run the console or server.
pub async fn handle_command(command: &Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Init => {
            println!("Initializing Confab configuration...");
            init_config()?;
            println!("Configuration initialized successfully!");
            Ok(true)
        }
        Commands::Models { backend } => {
            let kinds = match backend {
                Some(tag) => vec![tag.parse::<BackendKind>()?],
                None => BackendKind::ALL.to_vec(),
            };
            list_models(config, &kinds).await?;
            Ok(true)
        }
        Commands::Status => {
            show_status(config).await?;
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
        Commands::Serve | Commands::Console { .. } => Ok(false),
    }
}

/// List available models
pub async fn list_models(config: &Config, kinds: &[BackendKind]) -> Result<()> {
    let registry = BackendRegistry::from_config(config)?;
    for kind in kinds {
        let Some(backend) = registry.get(*kind) else {
            continue;
        };
        println!("{} models:", kind.display_name());
        let models = backend.list_models().await;
        if models.is_empty() {
            println!("  {}", "(none available)".yellow());
        }
        for model in models {
            println!("  • {}", model.green());
        }
    }
    Ok(())
}

/// Show version information
pub fn show_version() {
    println!("Confab v{}", env!("CARGO_PKG_VERSION"));
    println!("   Named, persistent LLM conversations with a console and an HTTP API");
}

/// Show what this process would run with
async fn show_status(config: &Config) -> Result<()> {
    println!("Confab Status:");
    println!();

    let global_config = get_config_dir()?.join("config.toml");
    if global_config.exists() {
        println!("  [OK] Configuration: {}", global_config.display());
    } else {
        println!("  [WARNING] Configuration: Not found (using defaults)");
    }

    let store_path = config.store.resolved_path()?;
    match ContextStore::open(&store_path).and_then(|store| store.load_all()) {
        Ok(contexts) => println!(
            "  [OK] Store: {} ({} contexts)",
            store_path.display(),
            contexts.len()
        ),
        Err(e) => println!("  [ERROR] Store: {} ({:#})", store_path.display(), e),
    }
    println!(
        "  [OK] HTTP API: http://{} (autosave {})",
        config.server.address(),
        if config.store.autosave { "on" } else { "off" }
    );

    let registry = BackendRegistry::from_config(config)?;
    if let Some(ollama) = registry.get(BackendKind::Ollama) {
        let models = ollama.list_models().await;
        let address = format!("{}:{}", config.ollama.host, config.ollama.port);
        if models.is_empty() {
            println!("  [WARNING] Ollama: No models at {}", address);
        } else {
            println!("  [OK] Ollama: Running at {} ({} models installed)", address, models.len());
            for model in models.iter().take(3) {
                println!("      • {}", model);
            }
            if models.len() > 3 {
                println!("      ... and {} more", models.len() - 3);
            }
        }
    }

    println!("\n  Environment:");
    for (name, cloud) in [("Cerebras", &config.cerebras), ("Groq", &config.groq.api)] {
        let state = if cloud.api_key().is_some() { "Set" } else { "Not set" };
        println!("    • {} ({}): {}", cloud.api_key_env, name, state);
    }

    println!();
    Ok(())
}
