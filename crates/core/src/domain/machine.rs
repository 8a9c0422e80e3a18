// Machine Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::buffer::BufferId;
use crate::domain::operation::{OperationId, ToolId};
use crate::domain::outage::ActiveOutage;
use crate::domain::time::Occupied;

/// Machine ID
pub type MachineId = String;

/// Machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachinePhase {
    Idle,
    Setup,
    Working,
    Outage,
}

impl std::fmt::Display for MachinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachinePhase::Idle => write!(f, "IDLE"),
            MachinePhase::Setup => write!(f, "SETUP"),
            MachinePhase::Working => write!(f, "WORKING"),
            MachinePhase::Outage => write!(f, "OUTAGE"),
        }
    }
}

/// Machine state value.
///
/// Buffers are referenced by id (no cross-pointers): `prebuffer_id` feeds
/// the machine, `buffer_id` is the internal single-slot buffer holding the
/// job while it is processed, `postbuffer_id` receives finished jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub id: MachineId,
    pub phase: MachinePhase,
    pub current_operation: Option<OperationId>,
    pub current_tool: Option<ToolId>,
    pub occupied_till: Occupied,
    pub prebuffer_id: BufferId,
    pub buffer_id: BufferId,
    pub postbuffer_id: BufferId,
    /// Present while phase == OUTAGE; remembers what to resume
    pub active_outage: Option<ActiveOutage<MachinePhase>>,
}

impl MachineState {
    pub fn is_idle(&self) -> bool {
        self.phase == MachinePhase::Idle
    }

    /// Buffer ids owned by this machine, in pre/internal/post order.
    pub fn buffer_ids(&self) -> [&BufferId; 3] {
        [&self.prebuffer_id, &self.buffer_id, &self.postbuffer_id]
    }
}
