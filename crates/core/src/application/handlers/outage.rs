// Outage Entry and Exit Handlers
//
// Overlapping occurrences serialize in arrival order: an occurrence that
// comes due while its component is already in OUTAGE waits for the exit.

use rand::rngs::StdRng;
use tracing::debug;

use crate::application::query;
use crate::domain::error::{DomainError, Result};
use crate::domain::{
    ActiveOutage, Duration, Instance, MachinePhase, Occupied, OutageSchedule, PendingOutage, State,
    Time, TransportPhase,
};

/// Pop the earliest due occurrence for a component.
fn take_due_outage(state: &mut State, component_id: &str) -> Result<PendingOutage> {
    let now = state.time;
    let pos = state
        .pending_outages
        .iter()
        .enumerate()
        .filter(|(_, o)| o.component_id == component_id && o.due_at <= now)
        .min_by_key(|(_, o)| (o.due_at, o.schedule_idx))
        .map(|(i, _)| i)
        .ok_or_else(|| DomainError::invalid_transition(component_id, "no outage is due"))?;
    Ok(state.pending_outages.remove(pos))
}

/// The paused occupation: scheduled work slides by the outage duration.
fn shifted(occupied: &Occupied, duration: Duration) -> Occupied {
    match occupied {
        Occupied::AtTime(t) => Occupied::AtTime(t.plus(duration)),
        other => other.clone(),
    }
}

fn resample(
    schedule: &OutageSchedule,
    component_id: &str,
    schedule_idx: usize,
    now: Time,
    rng: &mut StdRng,
) -> PendingOutage {
    PendingOutage {
        component_id: component_id.to_string(),
        schedule_idx,
        kind: schedule.kind,
        due_at: now.plus(schedule.frequency.sample(rng)),
        duration: schedule.duration.sample(rng),
    }
}

pub fn enter_machine(state: &State, machine_id: &str) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;
    let outage = take_due_outage(&mut next, machine_id)?;

    let machine = query::machine_mut(&mut next, machine_id)?;
    machine.active_outage = Some(ActiveOutage {
        kind: outage.kind,
        schedule_idx: outage.schedule_idx,
        resume_phase: machine.phase,
        resume_occupied: shifted(&machine.occupied_till, outage.duration),
    });
    machine.phase = MachinePhase::Outage;
    machine.occupied_till = Occupied::AtTime(now.plus(outage.duration));

    debug!(machine = %machine_id, kind = %outage.kind, duration = outage.duration, "Machine entering OUTAGE");
    Ok(next)
}

pub fn exit_machine(
    state: &State,
    instance: &Instance,
    machine_id: &str,
    rng: &mut StdRng,
) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;

    let machine = query::machine_mut(&mut next, machine_id)?;
    let active = machine.active_outage.take().ok_or_else(|| {
        DomainError::InconsistentState(format!(
            "machine {} in OUTAGE without active outage record",
            machine_id
        ))
    })?;
    machine.phase = active.resume_phase;
    machine.occupied_till = active.resume_occupied;

    let schedule = instance
        .machine_spec(machine_id)?
        .outages
        .get(active.schedule_idx)
        .ok_or_else(|| {
            DomainError::InvalidValue(format!(
                "machine {} has no outage schedule {}",
                machine_id, active.schedule_idx
            ))
        })?;
    let pending = resample(schedule, machine_id, active.schedule_idx, now, rng);
    next.pending_outages.push(pending);

    debug!(machine = %machine_id, resume = %active.resume_phase, "Machine leaving OUTAGE");
    Ok(next)
}

pub fn enter_transport(state: &State, transport_id: &str) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;
    let outage = take_due_outage(&mut next, transport_id)?;

    let transport = query::transport_mut(&mut next, transport_id)?;
    transport.active_outage = Some(ActiveOutage {
        kind: outage.kind,
        schedule_idx: outage.schedule_idx,
        resume_phase: transport.phase,
        resume_occupied: shifted(&transport.occupied_till, outage.duration),
    });
    transport.phase = TransportPhase::Outage;
    transport.occupied_till = Occupied::AtTime(now.plus(outage.duration));

    debug!(transport = %transport_id, kind = %outage.kind, duration = outage.duration, "Transport entering OUTAGE");
    Ok(next)
}

pub fn exit_transport(
    state: &State,
    instance: &Instance,
    transport_id: &str,
    rng: &mut StdRng,
) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;

    let transport = query::transport_mut(&mut next, transport_id)?;
    let active = transport.active_outage.take().ok_or_else(|| {
        DomainError::InconsistentState(format!(
            "transport {} in OUTAGE without active outage record",
            transport_id
        ))
    })?;
    transport.phase = active.resume_phase;
    transport.occupied_till = active.resume_occupied;

    let schedule = instance
        .transport_spec(transport_id)?
        .outages
        .get(active.schedule_idx)
        .ok_or_else(|| {
            DomainError::InvalidValue(format!(
                "transport {} has no outage schedule {}",
                transport_id, active.schedule_idx
            ))
        })?;
    let pending = resample(schedule, transport_id, active.schedule_idx, now, rng);
    next.pending_outages.push(pending);

    debug!(transport = %transport_id, "Transport leaving OUTAGE");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;
    use crate::domain::{OutageKind, TimeSource};
    use rand::SeedableRng;

    fn with_machine_outage() -> (Instance, State) {
        let (mut instance, mut state) = testkit::two_machine_shop();
        instance.machines[0].outages.push(OutageSchedule {
            kind: OutageKind::Maintenance,
            frequency: TimeSource::constant(5),
            duration: TimeSource::constant(4),
        });
        state.pending_outages.push(PendingOutage {
            component_id: "m-0".into(),
            schedule_idx: 0,
            kind: OutageKind::Maintenance,
            due_at: Time(5),
            duration: 4,
        });
        (instance, state)
    }

    #[test]
    fn outage_during_working_pauses_the_job() {
        let (instance, mut state) = with_machine_outage();
        // m-0 busy until t=10, outage due at t=5 for 4
        {
            let machine = query::machine_mut(&mut state, "m-0").unwrap();
            machine.phase = MachinePhase::Working;
            machine.occupied_till = Occupied::AtTime(Time(10));
        }
        state.time = Time(5);

        let in_outage = enter_machine(&state, "m-0").unwrap();
        let machine = query::machine(&in_outage, "m-0").unwrap();
        assert_eq!(machine.phase, MachinePhase::Outage);
        assert_eq!(machine.occupied_till, Occupied::AtTime(Time(9)));
        let active = machine.active_outage.as_ref().unwrap();
        assert_eq!(active.resume_phase, MachinePhase::Working);
        assert_eq!(active.resume_occupied, Occupied::AtTime(Time(14)));

        let mut at_exit = in_outage.clone();
        at_exit.time = Time(9);
        let mut rng = StdRng::seed_from_u64(0);
        let resumed = exit_machine(&at_exit, &instance, "m-0", &mut rng).unwrap();
        let machine = query::machine(&resumed, "m-0").unwrap();
        assert_eq!(machine.phase, MachinePhase::Working);
        assert_eq!(machine.occupied_till, Occupied::AtTime(Time(14)));
        // next occurrence resampled relative to the exit
        let pending = resumed
            .pending_outages
            .iter()
            .find(|o| o.component_id == "m-0")
            .unwrap();
        assert_eq!(pending.due_at, Time(14));
    }

    #[test]
    fn earliest_due_occurrence_fires_first(){
        let (_, mut state) = with_machine_outage();
        state.pending_outages.push(PendingOutage {
            component_id: "m-0".into(),
            schedule_idx: 1,
            kind: OutageKind::Fail,
            due_at: Time(3),
            duration: 2,
        });
        state.time = Time(6);
        let outage = take_due_outage(&mut state, "m-0").unwrap();
        assert_eq!(outage.due_at, Time(3));
        assert_eq!(state.pending_outages.len(), 1);
    }
}
