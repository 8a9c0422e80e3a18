// Transition Handlers
//
// Pure functions: each takes the current state and produces the next one.
// Dispatch is by component kind and (current phase, target phase) edge;
// outage entries and exits are routed before the per-component handlers.

pub mod machine;
pub mod outage;
pub mod transport;

use rand::rngs::StdRng;

use crate::application::query;
use crate::domain::error::Result;
use crate::domain::{ComponentTransition, Instance, MachinePhase, State, TransportPhase};

/// Apply one validated transition, producing the next state value.
pub fn apply(
    state: &State,
    instance: &Instance,
    transition: &ComponentTransition,
    rng: &mut StdRng,
) -> Result<State> {
    match transition {
        ComponentTransition::Machine {
            machine_id,
            target,
            job_id,
        } => {
            let phase = query::machine(state, machine_id)?.phase;
            if phase == MachinePhase::Outage {
                outage::exit_machine(state, instance, machine_id, rng)
            } else if *target == MachinePhase::Outage {
                outage::enter_machine(state, machine_id)
            } else {
                machine::apply(state, instance, machine_id, *target, job_id.as_deref(), rng)
            }
        }
        ComponentTransition::Transport {
            transport_id,
            target,
            job_id,
        } => {
            let phase = query::transport(state, transport_id)?.phase;
            if phase == TransportPhase::Outage {
                outage::exit_transport(state, instance, transport_id, rng)
            } else if *target == TransportPhase::Outage {
                outage::enter_transport(state, transport_id)
            } else {
                transport::apply(state, instance, transport_id, *target, job_id.as_deref(), rng)
            }
        }
    }
}
