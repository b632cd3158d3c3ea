use thiserror::Error;

use crate::backends::{BackendKind, SettingsError};

/// Failure of a context manager operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManagerError {
    #[error("Context '{0}' does not exist.")]
    NotFound(String),

    #[error("Context '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Failed to generate a response for context '{0}'.")]
    GenerationFailed(String),

    #[error("Error: Invalid response format. Raw response: {raw}")]
    ParseFailed { raw: String },

    #[error("Context name cannot be empty.")]
    InvalidName,

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("No {0} backend is configured.")]
    BackendUnavailable(BackendKind),
}

impl ManagerError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ManagerError::NotFound(_) => "not_found",
            ManagerError::AlreadyExists(_) => "already_exists",
            ManagerError::GenerationFailed(_) => "generation_failed",
            ManagerError::ParseFailed { .. } => "parse_failed",
            ManagerError::InvalidName => "invalid_name",
            ManagerError::InvalidInput(_) => "invalid_input",
            ManagerError::Settings(_) => "invalid_settings",
            ManagerError::BackendUnavailable(_) => "backend_unavailable",
        }
    }
}
