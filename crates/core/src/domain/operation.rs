// Operation Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::machine::MachineId;

/// Operation ID (e.g. "j-0-op-1")
pub type OperationId = String;

/// Tool identifier
pub type ToolId = String;

/// Operation State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Idle,
    Processing,
    Done,
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationState::Idle => write!(f, "IDLE"),
            OperationState::Processing => write!(f, "PROCESSING"),
            OperationState::Done => write!(f, "DONE"),
        }
    }
}

/// One machine-bound unit of work for a job.
///
/// The duration lives in the instance (`OperationSpec`) and is sampled at
/// the moment the operation starts; the state value only tracks progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub machine_id: MachineId,
    pub tool: Option<ToolId>,
    pub state: OperationState,
}

impl Operation {
    pub fn is_idle(&self) -> bool {
        self.state == OperationState::Idle
    }

    pub fn is_done(&self) -> bool {
        self.state == OperationState::Done
    }
}
