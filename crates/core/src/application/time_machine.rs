// Time Machine - next-event computation and dependency resolution

use tracing::debug;

use crate::application::{buffers, query};
use crate::domain::{ComponentTransition, MachinePhase, Occupied, State, Time, TransportPhase};

/// The earliest upcoming scheduled event: a concrete occupation running
/// out, or an outage coming due on a component able to take it.
///
/// Returns `None` when nothing is scheduled; whether that is a deadlock
/// depends on the remaining start candidates and time dependencies.
pub fn next_event_time(state: &State) -> Option<Time> {
    let mut next: Option<Time> = None;
    let mut consider = |t: Time| {
        next = Some(match next {
            Some(best) if best <= t => best,
            _ => t,
        });
    };

    for machine in &state.machines {
        if let Some(t) = machine.occupied_till.due_at() {
            consider(t);
        }
    }
    for transport in &state.transports {
        if let Some(t) = transport.occupied_till.due_at() {
            consider(t);
        }
    }
    for outage in &state.pending_outages {
        let eligible = if let Ok(machine) = query::machine(state, &outage.component_id) {
            machine.phase != MachinePhase::Outage
        } else if let Ok(transport) = query::transport(state, &outage.component_id) {
            // A due outage waits out any running leg
            transport.phase == TransportPhase::Idle
        } else {
            false
        };
        if eligible {
            consider(outage.due_at);
        }
    }

    next
}

/// Deferred transitions whose time dependency has resolved.
///
/// R1: the blocking job is no longer at the head position of the buffer.
/// R2: another transport has claimed the blocking job; the buffer will
/// drain, so the wait collapses to a fresh pickup attempt.
pub fn resolved_dependencies(state: &State) -> Vec<ComponentTransition> {
    let mut out = vec![];
    for transport in &state.transports {
        let Occupied::Waiting(dep) = &transport.occupied_till else {
            continue;
        };
        if transport.phase == TransportPhase::Outage {
            continue; // stashed dependency; resumes after the outage
        }
        let r1 = match query::buffer(state, &dep.buffer_id) {
            Ok(buffer) => buffers::head_job(buffer) != Some(&dep.blocking_job_id),
            Err(_) => true,
        };
        let r2 = state.transports.iter().any(|t| {
            t.id != transport.id && t.transport_job.as_ref() == Some(&dep.blocking_job_id)
        });
        if r1 || r2 {
            debug!(
                transport = %transport.id,
                blocking = %dep.blocking_job_id,
                rule = if r1 { "head-moved" } else { "blocker-claimed" },
                "Time dependency resolved"
            );
            out.push((*dep.deferred).clone());
        }
    }
    out.sort_by(|a, b| a.component_id().cmp(b.component_id()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;
    use crate::domain::{BufferDiscipline, TimeDependency};

    fn park(state: &mut State, transport_id: &str, job: &str, blocking: &str, buffer: &str) {
        let deferred =
            ComponentTransition::transport(transport_id, TransportPhase::Pickup, Some(job.into()));
        let t = state
            .transports
            .iter_mut()
            .find(|t| t.id == transport_id)
            .unwrap();
        t.transport_job = Some(job.to_string());
        t.occupied_till = Occupied::Waiting(TimeDependency {
            blocking_job_id: blocking.to_string(),
            buffer_id: buffer.to_string(),
            deferred: Box::new(deferred),
        });
    }

    #[test]
    fn no_scheduled_event_on_fresh_idle_shop() {
        let (_, state) = testkit::two_machine_shop();
        assert_eq!(next_event_time(&state), None);
    }

    #[test]
    fn earliest_occupation_wins() {
        let (_, mut state) = testkit::two_machine_shop();
        state.machines[0].occupied_till = Occupied::AtTime(Time(9));
        state.machines[1].occupied_till = Occupied::AtTime(Time(4));
        assert_eq!(next_event_time(&state), Some(Time(4)));
    }

    #[test]
    fn dependency_resolves_when_head_moves() {
        let (_, mut state) = testkit::two_machine_shop();
        state
            .buffers
            .iter_mut()
            .find(|b| b.id == "in-buf")
            .unwrap()
            .discipline = BufferDiscipline::Fifo;
        park(&mut state, "t-0", "j-1", "j-0", "in-buf");

        assert!(resolved_dependencies(&state).is_empty(), "j-0 still heads the queue");

        // j-0 leaves the buffer
        testkit::relocate(&mut state, "j-0", "m-0-pre");
        let resolved = resolved_dependencies(&state);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].job_id().map(String::as_str), Some("j-1"));
    }

    #[test]
    fn dependency_resolves_when_blocker_is_claimed() {
        let (_, mut state) = testkit::two_machine_shop();
        state
            .buffers
            .iter_mut()
            .find(|b| b.id == "in-buf")
            .unwrap()
            .discipline = BufferDiscipline::Fifo;
        park(&mut state, "t-0", "j-1", "j-0", "in-buf");
        state.transports.push({
            let mut other = state.transports[0].clone();
            other.id = "t-1".into();
            other.transport_job = Some("j-0".into());
            other.occupied_till = Occupied::AtTime(Time(5));
            other.phase = TransportPhase::Pickup;
            other
        });

        let resolved = resolved_dependencies(&state);
        assert_eq!(resolved.len(), 1, "blocker claimed by t-1 resolves the wait");
    }
}
