//! HTTP API over the context manager.

mod handlers;
mod types;

use anyhow::{Context as _, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Contexts
        .route("/create_context", post(handlers::create_context))
        .route("/list_contexts", get(handlers::list_contexts))
        .route("/delete_context", post(handlers::delete_context))
        .route("/send_prompt", post(handlers::send_prompt))
        .route("/copy_context", post(handlers::copy_context))
        .route("/toggle_autosave", post(handlers::toggle_autosave))
        // Game
        .route("/start_game", post(handlers::start_game))
        .route("/game_turn", post(handlers::game_turn))
        // Backends
        .route("/list_models", get(handlers::list_models))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until the process exits
pub async fn serve(state: AppState, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", address))?;
    info!("HTTP API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .await
        .context("HTTP server stopped")
}
