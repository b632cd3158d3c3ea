use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use confab::{
    app::{load_config, AppState},
    cli::{handle_command, Cli, Commands, Console},
    server,
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // Subcommands that run to completion on their own
    if let Some(command) = &cli.command {
        if handle_command(command, &config).await? {
            return Ok(());
        }
    }

    let address = config.server.address();
    let state = AppState::build(config)?;

    match cli.command {
        Some(Commands::Serve) => server::serve(state, &address).await,
        Some(Commands::Console { no_server: true }) => run_console(state).await,
        _ => {
            let api_state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = server::serve(api_state, &address).await {
                    error!("HTTP API stopped: {:#}", e);
                }
            });
            run_console(state).await
        }
    }
}

async fn run_console(state: AppState) -> Result<()> {
    info!("Starting console");
    Console::stdin(state.manager.clone()).run().await
}
