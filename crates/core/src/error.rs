// Central Error Type for the Simulation Core

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using SimError
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// Whether the error is fatal for the current run.
    ///
    /// Rejected transitions are recoverable (the engine re-derives the
    /// possible set); everything else aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SimError::Domain(crate::domain::DomainError::InvalidTransition { .. })
        )
    }
}
