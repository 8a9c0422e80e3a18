// Transport (AGV) Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::buffer::BufferId;
use crate::domain::job::{JobId, LocationId};
use crate::domain::outage::ActiveOutage;
use crate::domain::time::Occupied;

/// Transport ID
pub type TransportId = String;

/// Transport phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportPhase {
    Idle,
    /// Empty leg towards the job to fetch
    Pickup,
    /// Loaded leg towards the destination
    Working,
    Outage,
}

impl std::fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportPhase::Idle => write!(f, "IDLE"),
            TransportPhase::Pickup => write!(f, "PICKUP"),
            TransportPhase::Working => write!(f, "WORKING"),
            TransportPhase::Outage => write!(f, "OUTAGE"),
        }
    }
}

/// Transport state value.
///
/// `transport_job` is claimed at commit time (before the job is physically
/// on board); `job.location` only becomes the transport id for the loaded
/// leg. `dropoff_buffer_id` is fixed when the loaded leg begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub id: TransportId,
    pub phase: TransportPhase,
    pub location: LocationId,
    pub transport_job: Option<JobId>,
    pub occupied_till: Occupied,
    pub dropoff_buffer_id: Option<BufferId>,
    /// Present while phase == OUTAGE; remembers what to resume
    pub active_outage: Option<ActiveOutage<TransportPhase>>,
}

impl TransportState {
    pub fn is_idle(&self) -> bool {
        self.phase == TransportPhase::Idle
    }
}
