//! Supervisor error types.
//!
//! "Already running" is not an error; it is a [`super::RunOutcome`].

use super::state_machine::TransitionError;

#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("No executable given")]
    EmptyCommand,

    #[error("Failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Supervisor is shutting down")]
    ShuttingDown,

    #[error("Failed to terminate '{name}': {reason}")]
    Terminate { name: String, reason: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl SupervisorError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCommand => "EMPTY_COMMAND",
            Self::Spawn { .. } => "SPAWN_FAILED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Terminate { .. } => "TERMINATE_FAILED",
            Self::Transition(_) => "INVALID_STATE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
