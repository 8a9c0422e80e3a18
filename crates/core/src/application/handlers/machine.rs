// Machine Transition Handlers

use rand::rngs::StdRng;
use tracing::debug;

use crate::application::{buffers, query};
use crate::domain::error::{DomainError, Result};
use crate::domain::{Instance, MachinePhase, Occupied, OperationState, State};

pub fn apply(
    state: &State,
    instance: &Instance,
    machine_id: &str,
    target: MachinePhase,
    job_id: Option<&str>,
    rng: &mut StdRng,
) -> Result<State> {
    let phase = query::machine(state, machine_id)?.phase;
    match (phase, target) {
        (MachinePhase::Idle, MachinePhase::Setup) => {
            let job_id = require_job(machine_id, job_id)?;
            start_setup(state, instance, machine_id, job_id)
        }
        (MachinePhase::Idle, MachinePhase::Working) => {
            let job_id = require_job(machine_id, job_id)?;
            start_working(state, instance, machine_id, job_id, rng)
        }
        (MachinePhase::Setup, MachinePhase::Working) => {
            finish_setup(state, instance, machine_id, rng)
        }
        (MachinePhase::Working, MachinePhase::Idle) => finish_work(state, instance, machine_id),
        (from, to) => Err(DomainError::NotImplemented(format!(
            "machine edge {} -> {} has no handler",
            from, to
        ))),
    }
}

fn require_job<'a>(machine_id: &str, job_id: Option<&'a str>) -> Result<&'a str> {
    job_id.ok_or_else(|| DomainError::invalid_transition(machine_id, "start requires a job"))
}

/// IDLE -> SETUP: reserve the operation and begin the tool change. The job
/// moves into the internal buffer; its operation stays IDLE until WORKING.
fn start_setup(state: &State, instance: &Instance, machine_id: &str, job_id: &str) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;

    let job = query::job(&next, job_id)?;
    let (_, op) = job.next_idle_operation().ok_or_else(|| {
        DomainError::invalid_transition(machine_id, format!("{} has no idle operation", job_id))
    })?;
    let op_id = op.id.clone();
    let op_tool = op.tool.clone();

    let spec = instance.machine_spec(machine_id)?;
    let machine = query::machine(&next, machine_id)?;
    let setup = spec.setup_duration(machine.current_tool.as_ref(), op_tool.as_ref());
    let internal = machine.buffer_id.clone();
    let feeding = query::job(&next, job_id)?.location.clone();

    buffers::transfer(&mut next, &feeding, &internal, job_id)?;

    let machine = query::machine_mut(&mut next, machine_id)?;
    machine.phase = MachinePhase::Setup;
    machine.current_operation = Some(op_id.clone());
    machine.occupied_till = Occupied::AtTime(now.plus(setup));

    debug!(machine = %machine_id, job = %job_id, operation = %op_id, setup, "Machine entering SETUP");
    Ok(next)
}

/// IDLE -> WORKING: direct start when no tool change is required.
fn start_working(
    state: &State,
    instance: &Instance,
    machine_id: &str,
    job_id: &str,
    rng: &mut StdRng,
) -> Result<State> {
    let mut next = state.clone();
    let machine = query::machine(&next, machine_id)?;
    let internal = machine.buffer_id.clone();
    let feeding = query::job(&next, job_id)?.location.clone();
    buffers::transfer(&mut next, &feeding, &internal, job_id)?;
    begin_processing(&mut next, instance, machine_id, job_id, rng)?;
    Ok(next)
}

/// SETUP -> WORKING: the tool change elapsed; start processing the
/// reserved operation.
fn finish_setup(
    state: &State,
    instance: &Instance,
    machine_id: &str,
    rng: &mut StdRng,
) -> Result<State> {
    let mut next = state.clone();
    let machine = query::machine(&next, machine_id)?;
    let op_id = machine.current_operation.clone().ok_or_else(|| {
        DomainError::InconsistentState(format!("machine {} in SETUP without operation", machine_id))
    })?;
    let job_id = job_of_operation(&next, &op_id)?;
    begin_processing(&mut next, instance, machine_id, &job_id, rng)?;
    Ok(next)
}

/// WORKING -> IDLE: operation done; job moves to the post-buffer. Without
/// transports a finished job is handed straight to the output buffer.
fn finish_work(state: &State, instance: &Instance, machine_id: &str) -> Result<State> {
    let mut next = state.clone();
    let machine = query::machine(&next, machine_id)?;
    let op_id = machine.current_operation.clone().ok_or_else(|| {
        DomainError::InconsistentState(format!(
            "machine {} in WORKING without operation",
            machine_id
        ))
    })?;
    let (internal, postbuffer) = (machine.buffer_id.clone(), machine.postbuffer_id.clone());
    let job_id = job_of_operation(&next, &op_id)?;

    let job = query::job_mut(&mut next, &job_id)?;
    let op = job
        .operations
        .iter_mut()
        .find(|o| o.id == op_id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown operation: {}", op_id)))?;
    op.state = OperationState::Done;

    let transportless = next.transports.is_empty();
    let destination = if transportless && query::job(&next, &job_id)?.all_operations_done() {
        instance.output_buffer_id()?
    } else {
        postbuffer
    };
    buffers::transfer(&mut next, &internal, &destination, &job_id)?;

    let machine = query::machine_mut(&mut next, machine_id)?;
    machine.phase = MachinePhase::Idle;
    machine.current_operation = None;
    machine.occupied_till = Occupied::Free;

    debug!(machine = %machine_id, job = %job_id, operation = %op_id, "Machine finished WORKING");
    Ok(next)
}

/// Shared tail of both WORKING entries: mark the operation PROCESSING,
/// mount its tool, sample the duration.
fn begin_processing(
    next: &mut State,
    instance: &Instance,
    machine_id: &str,
    job_id: &str,
    rng: &mut StdRng,
) -> Result<()> {
    let now = next.time;
    let job = query::job(next, job_id)?;
    let (idx, op) = job.next_idle_operation().ok_or_else(|| {
        DomainError::invalid_transition(machine_id, format!("{} has no idle operation", job_id))
    })?;
    let op_id = op.id.clone();
    let op_tool = op.tool.clone();
    let duration = instance
        .operation_spec(job_id, idx)?
        .duration
        .sample(rng);

    let job = query::job_mut(next, job_id)?;
    job.operations[idx].state = OperationState::Processing;

    let machine = query::machine_mut(next, machine_id)?;
    machine.phase = MachinePhase::Working;
    machine.current_operation = Some(op_id.clone());
    if op_tool.is_some() {
        machine.current_tool = op_tool;
    }
    machine.occupied_till = Occupied::AtTime(now.plus(duration));

    debug!(machine = %machine_id, job = %job_id, operation = %op_id, duration, "Machine entering WORKING");
    Ok(())
}

fn job_of_operation(state: &State, op_id: &str) -> Result<String> {
    query::job_of_operation(state, op_id).map(|j| j.id.clone())
}
