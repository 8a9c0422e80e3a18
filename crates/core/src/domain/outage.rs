// Outage Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::buffer::ComponentId;
use crate::domain::time::{Duration, Occupied, Time};
use crate::domain::time_source::TimeSource;

/// Outage type tag. Informational only (rendering/logging); no mechanical
/// effect on the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutageKind {
    Maintenance,
    Fail,
    Recharge,
}

impl std::fmt::Display for OutageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutageKind::Maintenance => write!(f, "MAINTENANCE"),
            OutageKind::Fail => write!(f, "FAIL"),
            OutageKind::Recharge => write!(f, "RECHARGE"),
        }
    }
}

/// Recurring outage declaration attached to a machine or transport.
///
/// After the component has been continuously available for the sampled
/// frequency period it enters OUTAGE for the sampled duration, then
/// returns to IDLE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageSchedule {
    pub kind: OutageKind,
    pub frequency: TimeSource,
    pub duration: TimeSource,
}

/// A pre-sampled upcoming outage occurrence for one schedule of one
/// component. Resampled each time the outage ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOutage {
    pub component_id: ComponentId,
    /// Index into the component's schedule list
    pub schedule_idx: usize,
    pub kind: OutageKind,
    pub due_at: Time,
    pub duration: Duration,
}

/// Stash of the interrupted work while a component sits in OUTAGE.
///
/// Outages that arrive during WORKING/SETUP pause the underlying work:
/// the resumed occupation is the old one extended by the outage duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveOutage<P> {
    pub kind: OutageKind,
    /// Schedule to resample once the outage ends
    pub schedule_idx: usize,
    pub resume_phase: P,
    pub resume_occupied: Occupied,
}
