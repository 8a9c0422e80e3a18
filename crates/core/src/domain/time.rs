// Simulation Time Model

use serde::{Deserialize, Serialize};

use crate::domain::buffer::BufferId;
use crate::domain::job::JobId;
use crate::domain::transition::ComponentTransition;

/// Plain duration in clock units
pub type Duration = u64;

/// Non-negative integer monotonic clock value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Time(pub u64);

impl Time {
    pub const ZERO: Time = Time(0);

    pub fn plus(self, duration: Duration) -> Time {
        Time(self.0 + duration)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={}", self.0)
    }
}

/// A deferred transition waiting on a named blocking job at a named buffer.
///
/// The owning component is parked until either the blocking job is no
/// longer at the buffer's head, or another transport has taken
/// responsibility for it; on resolution `deferred` is the transition to
/// apply next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDependency {
    pub blocking_job_id: JobId,
    pub buffer_id: BufferId,
    pub deferred: Box<ComponentTransition>,
}

/// Occupation of a component: either until a concrete clock value, or
/// parked on a time dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Occupied {
    /// No scheduled event for this component
    Free,
    /// Busy until the given time
    AtTime(Time),
    /// Parked until the dependency resolves
    Waiting(TimeDependency),
}

impl Occupied {
    /// The concrete due time, if one is scheduled.
    pub fn due_at(&self) -> Option<Time> {
        match self {
            Occupied::AtTime(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Occupied::Waiting(_))
    }

    /// Whether a scheduled occupation has elapsed at `now`.
    pub fn is_due(&self, now: Time) -> bool {
        matches!(self, Occupied::AtTime(t) if *t <= now)
    }
}
