// Observation Builder Port

use crate::domain::{Instance, MachinePhase, Occupied, State};

/// Opaque feature object of a pre-declared shape. Carried as a JSON value
/// so callers can featurize it however their agent stack expects.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Observation(pub serde_json::Value);

/// Builds the agent-facing view of a state.
pub trait ObservationBuilder: Send + Sync {
    fn build(&self, state: &State, instance: &Instance) -> Observation;
}

/// Default builder: a flat numeric snapshot of clock, machine occupancy
/// and per-job progress.
pub struct SnapshotObservationBuilder;

impl ObservationBuilder for SnapshotObservationBuilder {
    fn build(&self, state: &State, _instance: &Instance) -> Observation {
        let machines: Vec<serde_json::Value> = state
            .machines
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id,
                    "phase": m.phase,
                    "busy": m.phase != MachinePhase::Idle,
                    "occupied_till": m.occupied_till.due_at().map(|t| t.0),
                })
            })
            .collect();
        let transports: Vec<serde_json::Value> = state
            .transports
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "phase": t.phase,
                    "location": t.location,
                    "carrying": t.transport_job,
                    "waiting": matches!(t.occupied_till, Occupied::Waiting(_)),
                })
            })
            .collect();
        let jobs: Vec<serde_json::Value> = state
            .jobs
            .iter()
            .map(|j| {
                let done = j.operations.iter().filter(|o| o.is_done()).count();
                serde_json::json!({
                    "id": j.id,
                    "location": j.location,
                    "done_operations": done,
                    "total_operations": j.operations.len(),
                })
            })
            .collect();
        Observation(serde_json::json!({
            "time": state.time.0,
            "machines": machines,
            "transports": transports,
            "jobs": jobs,
        }))
    }
}

pub mod mocks {
    use super::*;

    /// Constant observation, for middleware tests.
    pub struct MockObservationBuilder;

    impl ObservationBuilder for MockObservationBuilder {
        fn build(&self, _state: &State, _instance: &Instance) -> Observation {
            Observation(serde_json::json!(null))
        }
    }
}
