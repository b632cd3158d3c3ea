pub mod app;
pub mod backends;
pub mod cli;
pub mod constants;
pub mod game;
pub mod server;
pub mod session;
pub mod utils;

pub use app::{load_config, AppState, Config};
pub use backends::{Backend, BackendKind, BackendRegistry, Settings};
pub use game::{GamePayload, GameTurn};
pub use session::{ContextManager, ContextStore};
pub use utils::ManagerError;
