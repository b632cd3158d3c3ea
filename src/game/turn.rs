use tracing::info;

use super::payload::{format_game_output, parse_game_payload, GamePayload};
use super::prompts::{GAME_MASTER_PROMPT, OPENING_PROMPT};
use crate::backends::StreamCallback;
use crate::session::ContextManager;
use crate::utils::ManagerError;

/// A game turn that produced a usable payload
#[derive(Debug, Clone, PartialEq)]
pub struct GameTurn {
    pub payload: GamePayload,
    /// Console rendering of the payload
    pub formatted: String,
    /// Assistant text as recorded in history
    pub raw: String,
    pub warning: Option<String>,
}

impl ContextManager {
    /// Put the game-master instructions into the context and play the opening turn
    pub async fn start_game(
        &self,
        name: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<GameTurn, ManagerError> {
        info!(context = name, "Starting game");
        self.play(name, Some(GAME_MASTER_PROMPT), OPENING_PROMPT, stream_callback)
            .await
    }

    /// Play one turn with the player's input.
    ///
    /// A reply that is not a game payload fails with [`ManagerError::ParseFailed`]
    /// carrying the raw text; the player's input stays in history, the reply does not.
    pub async fn game_turn(
        &self,
        name: &str,
        user_input: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<GameTurn, ManagerError> {
        if user_input.trim().is_empty() {
            return Err(ManagerError::InvalidInput("Missing user input".to_string()));
        }
        self.play(name, None, user_input, stream_callback).await
    }

    async fn play(
        &self,
        name: &str,
        preamble: Option<&str>,
        prompt: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<GameTurn, ManagerError> {
        let outcome = self
            .run_turn(name, preamble, prompt, stream_callback, |raw| {
                parse_game_payload(raw).ok_or_else(|| ManagerError::ParseFailed {
                    raw: raw.to_string(),
                })
            })
            .await?;

        Ok(GameTurn {
            formatted: format_game_output(&outcome.value),
            payload: outcome.value,
            raw: outcome.response,
            warning: outcome.warning,
        })
    }
}
