// Buffer Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Buffer ID
pub type BufferId = String;

/// Component ID (machine or transport owning a buffer)
pub type ComponentId = String;

/// Ordering discipline: defines the single pickupable head position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BufferDiscipline {
    /// Head at the front
    Fifo,
    /// Head at the back
    Lifo,
    /// Any position is pickupable
    Flex,
    /// Single implicit slot; position 0 only
    Dummy,
}

impl std::fmt::Display for BufferDiscipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferDiscipline::Fifo => write!(f, "FIFO"),
            BufferDiscipline::Lifo => write!(f, "LIFO"),
            BufferDiscipline::Flex => write!(f, "FLEX"),
            BufferDiscipline::Dummy => write!(f, "DUMMY"),
        }
    }
}

/// Role of a buffer in the shopfloor topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BufferRole {
    Input,
    Output,
    Component,
    Compensation,
}

/// A buffer holding an ordered sequence of job ids.
///
/// Invariants: `store.len() <= capacity`; each job id appears in exactly
/// one container system-wide; a job that entered an OUTPUT buffer never
/// leaves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferState {
    pub id: BufferId,
    pub discipline: BufferDiscipline,
    pub role: BufferRole,
    pub capacity: usize,
    /// Owning machine or transport, if any
    pub parent: Option<ComponentId>,
    pub store: Vec<JobId>,
}

impl BufferState {
    pub fn is_full(&self) -> bool {
        self.store.len() >= self.capacity
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.store.iter().any(|j| j == job_id)
    }
}
