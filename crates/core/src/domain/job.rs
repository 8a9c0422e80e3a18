// Job Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::operation::Operation;

/// Job ID
pub type JobId = String;

/// Location identifier: the id of the buffer, machine, or transport
/// currently holding a job
pub type LocationId = String;

/// A job: an ordered tuple of operations plus its current location.
///
/// Operations are totally ordered; operation k may not start until
/// operation k-1 is DONE. A job has exactly one location at any instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub operations: Vec<Operation>,
    pub location: LocationId,
}

impl Job {
    /// Index and reference of the next IDLE operation, if any.
    pub fn next_idle_operation(&self) -> Option<(usize, &Operation)> {
        self.operations
            .iter()
            .enumerate()
            .find(|(_, op)| op.is_idle())
    }

    /// Whether every operation of this job is DONE.
    pub fn all_operations_done(&self) -> bool {
        self.operations.iter().all(|op| op.is_done())
    }

    /// Whether some operation is currently PROCESSING.
    pub fn has_processing_operation(&self) -> bool {
        self.operations
            .iter()
            .any(|op| op.state == crate::domain::operation::OperationState::Processing)
    }
}
