// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// A generated transition failed a validator. Recoverable: the offending
    /// transition is discarded and the possible set is re-derived.
    #[error("Invalid transition for {component_id}: {reason}")]
    InvalidTransition { component_id: String, reason: String },

    /// An internal invariant was violated. Indicates a defect in the engine
    /// itself; fatal for the run.
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// Malformed input to a utility (unknown id, bad capacity, ...).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Reached a duration or transition variant not yet supported.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl DomainError {
    pub fn invalid_transition(component_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::InvalidTransition {
            component_id: component_id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
