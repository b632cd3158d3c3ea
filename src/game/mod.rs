// Gateway module for the adventure game - follows the Train Station Pattern
// All external access must go through this gateway

mod payload;
mod prompts;
mod turn;

pub use payload::{format_game_output, parse_game_payload, GameAction, GamePayload, ImageDetails};
pub use prompts::{GAME_MASTER_PROMPT, OPENING_PROMPT};
pub use turn::GameTurn;
