// Possible-Transitions Generator
//
// Tie-breaking within one tick: outage > completion > start, then stable
// order by component id (and job id for multi-job candidates).

use crate::application::{buffers, jobs, query};
use crate::domain::error::Result;
use crate::domain::{
    BufferDiscipline, ComponentTransition, Instance, MachinePhase, State, TransportPhase,
};

/// Everything that may fire at the current instant, priority-ordered.
pub fn possible_transitions(
    state: &State,
    instance: &Instance,
    allow_early_transport: bool,
) -> Result<Vec<ComponentTransition>> {
    let mut out = forced_transitions(state);
    out.extend(start_transitions(state, instance, allow_early_transport)?);
    Ok(out)
}

/// Due outage entries followed by due completions. These never require an
/// agent decision.
pub fn forced_transitions(state: &State) -> Vec<ComponentTransition> {
    let mut out = outage_entries(state);
    out.extend(completions(state));
    out
}

fn outage_entries(state: &State) -> Vec<ComponentTransition> {
    let now = state.time;
    let mut components: Vec<&str> = state
        .pending_outages
        .iter()
        .filter(|o| o.due_at <= now)
        .map(|o| o.component_id.as_str())
        .collect();
    components.sort_unstable();
    components.dedup();

    let mut out = vec![];
    for id in components {
        if let Ok(machine) = query::machine(state, id) {
            if machine.phase != MachinePhase::Outage {
                out.push(ComponentTransition::machine(id, MachinePhase::Outage, None));
            }
        } else if let Ok(transport) = query::transport(state, id) {
            // Transports only break down while idle; running legs finish first
            if transport.phase == TransportPhase::Idle {
                out.push(ComponentTransition::transport(
                    id,
                    TransportPhase::Outage,
                    None,
                ));
            }
        }
    }
    out
}

fn completions(state: &State) -> Vec<ComponentTransition> {
    let now = state.time;
    let mut out = vec![];

    for machine in &state.machines {
        if !machine.occupied_till.is_due(now) {
            continue;
        }
        let job = machine
            .current_operation
            .as_deref()
            .and_then(|op| query::job_of_operation(state, op).ok())
            .map(|j| j.id.clone());
        match machine.phase {
            MachinePhase::Setup => {
                out.push(ComponentTransition::machine(
                    &machine.id,
                    MachinePhase::Working,
                    job,
                ));
            }
            MachinePhase::Working => {
                out.push(ComponentTransition::machine(
                    &machine.id,
                    MachinePhase::Idle,
                    job,
                ));
            }
            MachinePhase::Outage => {
                if let Some(active) = &machine.active_outage {
                    out.push(ComponentTransition::machine(
                        &machine.id,
                        active.resume_phase,
                        job,
                    ));
                }
            }
            MachinePhase::Idle => {}
        }
    }

    for transport in &state.transports {
        if !transport.occupied_till.is_due(now) {
            continue;
        }
        match transport.phase {
            TransportPhase::Pickup => {
                out.push(ComponentTransition::transport(
                    &transport.id,
                    TransportPhase::Working,
                    transport.transport_job.clone(),
                ));
            }
            TransportPhase::Working => {
                out.push(ComponentTransition::transport(
                    &transport.id,
                    TransportPhase::Idle,
                    transport.transport_job.clone(),
                ));
            }
            TransportPhase::Outage => {
                if let Some(active) = &transport.active_outage {
                    out.push(ComponentTransition::transport(
                        &transport.id,
                        active.resume_phase,
                        None,
                    ));
                }
            }
            TransportPhase::Idle => {}
        }
    }

    out.sort_by(|a, b| a.component_id().cmp(b.component_id()));
    out
}

/// Agent-facing start candidates: machine starts and transport pickups.
pub fn start_transitions(
    state: &State,
    instance: &Instance,
    allow_early_transport: bool,
) -> Result<Vec<ComponentTransition>> {
    let mut out = vec![];

    // Without transports, jobs feed machines straight from whichever
    // buffer holds them; with transports, only the pre-buffer feeds
    let transportless = state.transports.is_empty();

    for machine in &state.machines {
        if machine.phase != MachinePhase::Idle {
            continue;
        }
        let internal = query::buffer(state, &machine.buffer_id)?;
        if internal.is_full() {
            continue;
        }
        let feeding: Vec<&crate::domain::BufferState> = if transportless {
            state
                .buffers
                .iter()
                .filter(|b| {
                    b.discipline != BufferDiscipline::Dummy
                        && b.role != crate::domain::BufferRole::Output
                })
                .collect()
        } else {
            vec![query::buffer(state, &machine.prebuffer_id)?]
        };
        let mut candidates: Vec<&String> = vec![];
        for buffer in feeding {
            match buffer.discipline {
                BufferDiscipline::Flex => candidates.extend(buffer.store.iter()),
                _ => candidates.extend(buffers::head_job(buffer)),
            }
        }
        for job_id in candidates {
            let job = query::job(state, job_id)?;
            let Some((_, op)) = job.next_idle_operation() else {
                continue;
            };
            if op.machine_id != machine.id {
                continue;
            }
            let spec = instance.machine_spec(&machine.id)?;
            let setup = spec.setup_duration(machine.current_tool.as_ref(), op.tool.as_ref());
            let target = if setup > 0 {
                MachinePhase::Setup
            } else {
                MachinePhase::Working
            };
            out.push(ComponentTransition::machine(
                &machine.id,
                target,
                Some(job_id.clone()),
            ));
        }
    }

    for transport in &state.transports {
        if transport.phase != TransportPhase::Idle
            || transport.transport_job.is_some()
            || transport.occupied_till.is_waiting()
        {
            continue;
        }
        for job in &state.jobs {
            let claimed = state
                .transports
                .iter()
                .any(|t| t.transport_job.as_ref() == Some(&job.id));
            if claimed {
                continue;
            }
            let Ok(buffer) = query::buffer(state, &job.location) else {
                continue; // on a machine or on board, not pickable
            };
            if !jobs::is_transportable(job, state, instance)?.is_transportable() {
                continue;
            }
            if !allow_early_transport && !buffers::can_pick(buffer, &job.id) {
                continue;
            }
            out.push(ComponentTransition::transport(
                &transport.id,
                TransportPhase::Pickup,
                Some(job.id.clone()),
            ));
        }
    }

    out.sort_by(|a, b| {
        (a.component_id(), a.job_id()).cmp(&(b.component_id(), b.job_id()))
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;
    use crate::domain::Occupied;

    #[test]
    fn initial_shop_offers_transport_pickups_only() {
        let (instance, state) = testkit::two_machine_shop();
        let starts = start_transitions(&state, &instance, true).unwrap();
        assert_eq!(starts.len(), 2, "one pickup offer per job: {:?}", starts);
        assert!(starts.iter().all(|t| matches!(
            t,
            ComponentTransition::Transport {
                target: TransportPhase::Pickup,
                ..
            }
        )));
    }

    #[test]
    fn machine_start_offered_once_job_is_staged() {
        let (instance, mut state) = testkit::two_machine_shop();
        testkit::relocate(&mut state, "j-0", "m-0-pre");
        let starts = start_transitions(&state, &instance, true).unwrap();
        assert!(
            starts.contains(&ComponentTransition::machine(
                "m-0",
                MachinePhase::Working,
                Some("j-0".into())
            )),
            "expected a direct WORKING start: {:?}",
            starts
        );
    }

    #[test]
    fn head_gate_filters_pickups_when_early_transport_is_off() {
        let (instance, mut state) = testkit::two_machine_shop();
        // make the input buffer FIFO so only j-0 is at the head
        state
            .buffers
            .iter_mut()
            .find(|b| b.id == "in-buf")
            .unwrap()
            .discipline = BufferDiscipline::Fifo;

        let open = start_transitions(&state, &instance, true).unwrap();
        assert_eq!(open.len(), 2);

        let gated = start_transitions(&state, &instance, false).unwrap();
        assert_eq!(gated.len(), 1);
        assert_eq!(gated[0].job_id().map(String::as_str), Some("j-0"));
    }

    #[test]
    fn no_pickup_offered_while_a_job_is_being_processed() {
        let (instance, mut state) = testkit::two_machine_shop();
        // m-0 is working on j-0's first operation; the second targets m-1
        testkit::relocate(&mut state, "j-0", "m-0-buf");
        {
            let job = state.jobs.iter_mut().find(|j| j.id == "j-0").unwrap();
            job.operations[0].state = crate::domain::OperationState::Processing;
            let machine = state.machines.iter_mut().find(|m| m.id == "m-0").unwrap();
            machine.phase = MachinePhase::Working;
            machine.current_operation = Some("j-0-op-0".into());
            machine.occupied_till = Occupied::AtTime(crate::domain::Time(3));
        }

        let starts = start_transitions(&state, &instance, true).unwrap();
        assert!(
            starts
                .iter()
                .all(|t| t.job_id().map(String::as_str) != Some("j-0")),
            "an in-flight job must not be offered for pickup: {:?}",
            starts
        );
    }

    #[test]
    fn due_completion_is_forced() {
        let (_, mut state) = testkit::two_machine_shop();
        testkit::relocate(&mut state, "j-0", "m-0-buf");
        {
            let job = state.jobs.iter_mut().find(|j| j.id == "j-0").unwrap();
            job.operations[0].state = crate::domain::OperationState::Processing;
            let machine = state.machines.iter_mut().find(|m| m.id == "m-0").unwrap();
            machine.phase = MachinePhase::Working;
            machine.current_operation = Some("j-0-op-0".into());
            machine.occupied_till = Occupied::AtTime(crate::domain::Time(3));
        }
        state.time = crate::domain::Time(3);
        let forced = forced_transitions(&state);
        assert_eq!(
            forced,
            vec![ComponentTransition::machine(
                "m-0",
                MachinePhase::Idle,
                Some("j-0".into())
            )]
        );
    }
}
