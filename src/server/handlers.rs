use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde_json::json;
use tracing::debug;

use super::types::{
    success, ApiFailure, ApiResult, CopyContextRequest, CreateContextRequest, GameTurnRequest,
    ModelsQuery, NameRequest, SendPromptRequest, StartGameRequest, ToggleAutosaveRequest,
};
use crate::app::AppState;
use crate::backends::{BackendKind, Settings};
use crate::constants::DEFAULT_SYSTEM_PROMPT;
use crate::game::GameTurn;

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "confab",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn create_context(
    State(state): State<AppState>,
    body: Result<Json<CreateContextRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let backend: BackendKind = request.backend.parse()?;
    let settings = Settings::from_fields(backend, request.settings)?;
    let system_prompt = request
        .system_prompt
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let ack = state
        .manager
        .create_context(&request.name, backend, &request.model, &system_prompt, settings)
        .await?;
    Ok(success(json!({ "message": ack.message }), ack.warning))
}

pub async fn list_contexts(State(state): State<AppState>) -> ApiResult {
    let contexts = state.manager.list_contexts().await;
    Ok(success(json!({ "contexts": contexts }), None))
}

pub async fn delete_context(
    State(state): State<AppState>,
    body: Result<Json<NameRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let ack = state.manager.delete_context(&request.name).await?;
    Ok(success(json!({ "message": ack.message }), ack.warning))
}

pub async fn send_prompt(
    State(state): State<AppState>,
    body: Result<Json<SendPromptRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    debug!(context = %request.name, "HTTP prompt");
    let reply = state
        .manager
        .send_prompt(&request.name, &request.prompt, None)
        .await?;
    Ok(success(json!({ "response": reply.response }), reply.warning))
}

pub async fn copy_context(
    State(state): State<AppState>,
    body: Result<Json<CopyContextRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let ack = state
        .manager
        .copy_context(&request.source_name, &request.new_name, request.num_messages)
        .await?;
    Ok(success(json!({ "message": ack.message }), ack.warning))
}

/// Flip autosave, or set it when the body names a value. An empty body is fine.
pub async fn toggle_autosave(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let request: ToggleAutosaveRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ToggleAutosaveRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiFailure::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let enabled = match request.enabled {
        Some(enabled) => {
            state.manager.set_autosave(enabled);
            enabled
        }
        None => state.manager.toggle_autosave(),
    };
    let message = format!("Autosave {}.", if enabled { "enabled" } else { "disabled" });
    Ok(success(json!({ "autosave": enabled, "message": message }), None))
}

pub async fn start_game(
    State(state): State<AppState>,
    body: Result<Json<StartGameRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let turn = state.manager.start_game(&request.context_name, None).await?;
    Ok(game_body(turn))
}

pub async fn game_turn(
    State(state): State<AppState>,
    body: Result<Json<GameTurnRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let turn = state
        .manager
        .game_turn(&request.context_name, &request.user_input, None)
        .await?;
    Ok(game_body(turn))
}

fn game_body(turn: GameTurn) -> Json<serde_json::Value> {
    success(
        json!({ "game_response": turn.formatted, "payload": turn.payload }),
        turn.warning,
    )
}

pub async fn list_models(
    State(state): State<AppState>,
    query: Result<Query<ModelsQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let tag = query
        .backend
        .ok_or_else(|| ApiFailure::BadRequest("Missing 'backend' query parameter".to_string()))?;
    let backend: BackendKind = tag.parse()?;

    let models = state.manager.list_models(backend).await?;
    Ok(success(json!({ "backend": backend, "models": models }), None))
}
