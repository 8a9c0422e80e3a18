// Transition Preconditions and State Invariants

use crate::application::{buffers, jobs, query};
use crate::domain::error::{DomainError, Result};
use crate::domain::{
    BufferRole, ComponentTransition, Instance, MachinePhase, OperationState, State,
    TransportPhase,
};

/// Gate one transition against the current state. Rejections are
/// recoverable: the engine discards the transition and re-derives the
/// possible set.
pub fn validate_transition(
    state: &State,
    instance: &Instance,
    transition: &ComponentTransition,
) -> Result<()> {
    match transition {
        ComponentTransition::Machine {
            machine_id,
            target,
            job_id,
        } => validate_machine(state, instance, machine_id, *target, job_id.as_deref()),
        ComponentTransition::Transport {
            transport_id,
            target,
            job_id,
        } => validate_transport(state, instance, transport_id, *target, job_id.as_deref()),
    }
}

fn validate_machine(
    state: &State,
    instance: &Instance,
    machine_id: &str,
    target: MachinePhase,
    job_id: Option<&str>,
) -> Result<()> {
    let machine = query::machine(state, machine_id)?;
    let now = state.time;

    // Outage exit: phase OUTAGE, due, target must match the stashed resume
    if machine.phase == MachinePhase::Outage {
        let Some(active) = &machine.active_outage else {
            return Err(DomainError::InconsistentState(format!(
                "machine {} in OUTAGE without active outage record",
                machine_id
            )));
        };
        if !machine.occupied_till.is_due(now) {
            return Err(DomainError::invalid_transition(
                machine_id,
                "outage has not elapsed",
            ));
        }
        if target != active.resume_phase {
            return Err(DomainError::invalid_transition(
                machine_id,
                format!("outage resumes into {}, not {}", active.resume_phase, target),
            ));
        }
        return Ok(());
    }

    // Outage entry: a due pending outage must exist
    if target == MachinePhase::Outage {
        let due = state
            .pending_outages
            .iter()
            .any(|o| o.component_id == machine_id && o.due_at <= now);
        if !due {
            return Err(DomainError::invalid_transition(
                machine_id,
                "no outage is due",
            ));
        }
        return Ok(());
    }

    match (machine.phase, target) {
        // Start: job must be pickable from the pre-buffer and its next idle
        // operation must name this machine
        (MachinePhase::Idle, MachinePhase::Setup) | (MachinePhase::Idle, MachinePhase::Working) => {
            let job_id = job_id.ok_or_else(|| {
                DomainError::invalid_transition(machine_id, "start requires a job")
            })?;
            let job = query::job(state, job_id)?;
            // Without transports any buffer feeds the machine directly
            let transportless = state.transports.is_empty();
            if !transportless && job.location != machine.prebuffer_id {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    format!("{} is not in the pre-buffer", job_id),
                ));
            }
            let feeding = query::buffer(state, &job.location).map_err(|_| {
                DomainError::invalid_transition(
                    machine_id,
                    format!("{} is not in a buffer", job_id),
                )
            })?;
            if feeding.role == BufferRole::Output {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    format!("{} already delivered", job_id),
                ));
            }
            if !buffers::can_pick(feeding, job_id) {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    format!("{} is not at the pickup position of {}", job_id, feeding.id),
                ));
            }
            let Some((_, next)) = job.next_idle_operation() else {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    format!("{} has no idle operation", job_id),
                ));
            };
            if next.machine_id != machine_id {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    format!("next operation of {} targets {}", job_id, next.machine_id),
                ));
            }
            let internal = query::buffer(state, &machine.buffer_id)?;
            if internal.is_full() {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    "internal buffer occupied",
                ));
            }
            let spec = instance.machine_spec(machine_id)?;
            let setup = spec.setup_duration(machine.current_tool.as_ref(), next.tool.as_ref());
            match target {
                MachinePhase::Setup if setup == 0 => Err(DomainError::invalid_transition(
                    machine_id,
                    "no tool change required, SETUP must be skipped",
                )),
                MachinePhase::Working if setup > 0 => Err(DomainError::invalid_transition(
                    machine_id,
                    "tool change required before WORKING",
                )),
                _ => Ok(()),
            }
        }
        (MachinePhase::Setup, MachinePhase::Working) => {
            if !machine.occupied_till.is_due(now) {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    "setup has not elapsed",
                ));
            }
            Ok(())
        }
        (MachinePhase::Working, MachinePhase::Idle) => {
            if !machine.occupied_till.is_due(now) {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    "work has not elapsed",
                ));
            }
            // Without transports a job finishing its last operation goes
            // straight to the output buffer; check the actual destination
            let destination = match machine.current_operation.as_deref() {
                Some(op_id) => {
                    let job = query::job_of_operation(state, op_id)?;
                    let last = job.operations.iter().filter(|o| !o.is_done()).count() <= 1;
                    if state.transports.is_empty() && last {
                        instance.output_buffer_id()?
                    } else {
                        machine.postbuffer_id.clone()
                    }
                }
                None => machine.postbuffer_id.clone(),
            };
            let buffer = query::buffer(state, &destination)?;
            if buffer.is_full() {
                return Err(DomainError::invalid_transition(
                    machine_id,
                    format!("destination buffer {} full", destination),
                ));
            }
            Ok(())
        }
        (from, to) => Err(DomainError::invalid_transition(
            machine_id,
            format!("no {} -> {} edge", from, to),
        )),
    }
}

fn validate_transport(
    state: &State,
    instance: &Instance,
    transport_id: &str,
    target: TransportPhase,
    job_id: Option<&str>,
) -> Result<()> {
    let transport = query::transport(state, transport_id)?;
    let now = state.time;

    if transport.phase == TransportPhase::Outage {
        let Some(active) = &transport.active_outage else {
            return Err(DomainError::InconsistentState(format!(
                "transport {} in OUTAGE without active outage record",
                transport_id
            )));
        };
        if !transport.occupied_till.is_due(now) {
            return Err(DomainError::invalid_transition(
                transport_id,
                "outage has not elapsed",
            ));
        }
        if target != active.resume_phase {
            return Err(DomainError::invalid_transition(
                transport_id,
                format!("outage resumes into {}, not {}", active.resume_phase, target),
            ));
        }
        return Ok(());
    }

    if target == TransportPhase::Outage {
        // Transports only break down while idle; a due outage waits out
        // any running leg
        if transport.phase != TransportPhase::Idle {
            return Err(DomainError::invalid_transition(
                transport_id,
                "transport outages only start from IDLE",
            ));
        }
        let due = state
            .pending_outages
            .iter()
            .any(|o| o.component_id == transport_id && o.due_at <= now);
        if !due {
            return Err(DomainError::invalid_transition(
                transport_id,
                "no outage is due",
            ));
        }
        return Ok(());
    }

    match (transport.phase, target) {
        // Pickup commit: job must be transportable and unclaimed
        (TransportPhase::Idle, TransportPhase::Pickup) => {
            let job_id = job_id.ok_or_else(|| {
                DomainError::invalid_transition(transport_id, "pickup requires a job")
            })?;
            if transport.transport_job.is_some() || transport.occupied_till.is_waiting() {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    "transport already committed",
                ));
            }
            let job = query::job(state, job_id)?;
            if query::buffer(state, &job.location).is_err() {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    format!("{} is not in a buffer", job_id),
                ));
            }
            let claimed = state
                .transports
                .iter()
                .any(|t| t.id != transport_id && t.transport_job.as_deref() == Some(job_id));
            if claimed {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    format!("{} already claimed by another transport", job_id),
                ));
            }
            let verdict = jobs::is_transportable(job, state, instance)?;
            if !verdict.is_transportable() {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    format!("{} needs no transport", job_id),
                ));
            }
            Ok(())
        }
        (TransportPhase::Pickup, TransportPhase::Working) => {
            if !matches!(transport.occupied_till, crate::domain::Occupied::Waiting(_))
                && !transport.occupied_till.is_due(now)
            {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    "pickup leg has not elapsed",
                ));
            }
            let job_id = transport.transport_job.as_deref().ok_or_else(|| {
                DomainError::InconsistentState(format!(
                    "transport {} in PICKUP without a claimed job",
                    transport_id
                ))
            })?;
            let job = query::job(state, job_id)?;
            if query::buffer(state, &job.location).is_err() {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    format!("{} is not in a buffer", job_id),
                ));
            }
            Ok(())
        }
        (TransportPhase::Working, TransportPhase::Idle) => {
            if !transport.occupied_till.is_due(now) {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    "loaded leg has not elapsed",
                ));
            }
            let job_id = transport.transport_job.as_deref().ok_or_else(|| {
                DomainError::InconsistentState(format!(
                    "transport {} in WORKING without a job",
                    transport_id
                ))
            })?;
            let job = query::job(state, job_id)?;
            if job.location != transport_id {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    format!("{} is not on board", job_id),
                ));
            }
            let dropoff = transport.dropoff_buffer_id.as_deref().ok_or_else(|| {
                DomainError::InconsistentState(format!(
                    "transport {} in WORKING without a destination",
                    transport_id
                ))
            })?;
            let buffer = query::buffer(state, dropoff)?;
            if buffer.is_full() {
                return Err(DomainError::invalid_transition(
                    transport_id,
                    format!("destination buffer {} full", dropoff),
                ));
            }
            Ok(())
        }
        (from, to) => Err(DomainError::invalid_transition(
            transport_id,
            format!("no {} -> {} edge", from, to),
        )),
    }
}

/// Structural invariants that must hold after every apply. A violation is
/// a defect in the engine, not a user error.
pub fn validate_state(prev: Option<&State>, state: &State, _instance: &Instance) -> Result<()> {
    // Conservation: every job id is located in exactly one container
    for job in &state.jobs {
        let in_buffers = state
            .buffers
            .iter()
            .map(|b| b.store.iter().filter(|j| **j == job.id).count())
            .sum::<usize>();
        let on_transports = state
            .transports
            .iter()
            .filter(|t| job.location == t.id && t.transport_job.as_ref() == Some(&job.id))
            .count();
        if in_buffers + on_transports != 1 {
            return Err(DomainError::InconsistentState(format!(
                "job {} held by {} containers",
                job.id,
                in_buffers + on_transports
            )));
        }
        if in_buffers == 1 {
            let holder = state
                .buffers
                .iter()
                .find(|b| b.contains(&job.id))
                .map(|b| b.id.clone())
                .unwrap_or_default();
            if holder != job.location {
                return Err(DomainError::InconsistentState(format!(
                    "job {} located at {} but stored in {}",
                    job.id, job.location, holder
                )));
            }
        }
    }

    // Buffer capacity
    for buffer in &state.buffers {
        if buffer.store.len() > buffer.capacity {
            return Err(DomainError::InconsistentState(format!(
                "buffer {} over capacity: {}/{}",
                buffer.id,
                buffer.store.len(),
                buffer.capacity
            )));
        }
    }

    // Operation precedence: PROCESSING implies all predecessors DONE
    for job in &state.jobs {
        for (idx, op) in job.operations.iter().enumerate() {
            if op.state == OperationState::Processing
                && !job.operations[..idx].iter().all(|o| o.is_done())
            {
                return Err(DomainError::InconsistentState(format!(
                    "operation {} processing before predecessors done",
                    op.id
                )));
            }
        }
    }

    // Single-claim: transports per job, machines per operation
    for (i, a) in state.transports.iter().enumerate() {
        for b in state.transports.iter().skip(i + 1) {
            if a.transport_job.is_some() && a.transport_job == b.transport_job {
                return Err(DomainError::InconsistentState(format!(
                    "job {} claimed by {} and {}",
                    a.transport_job.as_deref().unwrap_or("?"),
                    a.id,
                    b.id
                )));
            }
        }
    }
    for (i, a) in state.machines.iter().enumerate() {
        for b in state.machines.iter().skip(i + 1) {
            if a.current_operation.is_some() && a.current_operation == b.current_operation {
                return Err(DomainError::InconsistentState(format!(
                    "operation {} claimed by {} and {}",
                    a.current_operation.as_deref().unwrap_or("?"),
                    a.id,
                    b.id
                )));
            }
        }
    }

    if let Some(prev) = prev {
        // Monotonic time
        if state.time < prev.time {
            return Err(DomainError::InconsistentState(format!(
                "time moved backwards: {} -> {}",
                prev.time, state.time
            )));
        }
        // Output-buffer terminality
        for buffer in prev.buffers.iter().filter(|b| b.role == BufferRole::Output) {
            let new = state
                .buffers
                .iter()
                .find(|b| b.id == buffer.id)
                .ok_or_else(|| {
                    DomainError::InconsistentState(format!("output buffer {} vanished", buffer.id))
                })?;
            for job in &buffer.store {
                if !new.contains(job) {
                    return Err(DomainError::InconsistentState(format!(
                        "job {} left output buffer {}",
                        job, buffer.id
                    )));
                }
            }
        }
    }

    Ok(())
}
