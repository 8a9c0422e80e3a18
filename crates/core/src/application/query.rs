// Id Lookups over State
//
// Relations between components are expressed by id + lookup; nothing in the
// state tree stores cross-pointers.

use crate::domain::error::{DomainError, Result};
use crate::domain::{BufferState, Job, MachineState, State, TransportState};

pub fn machine<'a>(state: &'a State, id: &str) -> Result<&'a MachineState> {
    state
        .machines
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown machine: {}", id)))
}

pub fn machine_mut<'a>(state: &'a mut State, id: &str) -> Result<&'a mut MachineState> {
    state
        .machines
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown machine: {}", id)))
}

pub fn transport<'a>(state: &'a State, id: &str) -> Result<&'a TransportState> {
    state
        .transports
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown transport: {}", id)))
}

pub fn transport_mut<'a>(state: &'a mut State, id: &str) -> Result<&'a mut TransportState> {
    state
        .transports
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown transport: {}", id)))
}

pub fn job<'a>(state: &'a State, id: &str) -> Result<&'a Job> {
    state
        .jobs
        .iter()
        .find(|j| j.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown job: {}", id)))
}

pub fn job_mut<'a>(state: &'a mut State, id: &str) -> Result<&'a mut Job> {
    state
        .jobs
        .iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown job: {}", id)))
}

pub fn buffer<'a>(state: &'a State, id: &str) -> Result<&'a BufferState> {
    state
        .buffers
        .iter()
        .find(|b| b.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown buffer: {}", id)))
}

pub fn buffer_mut<'a>(state: &'a mut State, id: &str) -> Result<&'a mut BufferState> {
    state
        .buffers
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or_else(|| DomainError::InvalidValue(format!("unknown buffer: {}", id)))
}

/// The job owning an operation id.
pub fn job_of_operation<'a>(state: &'a State, op_id: &str) -> Result<&'a Job> {
    state
        .jobs
        .iter()
        .find(|j| j.operations.iter().any(|o| o.id == op_id))
        .ok_or_else(|| DomainError::InvalidValue(format!("operation {} belongs to no job", op_id)))
}

/// Whether the location id names an OUTPUT-role buffer.
pub fn is_output_buffer(state: &State, location: &str) -> bool {
    state
        .buffers
        .iter()
        .any(|b| b.id == location && b.role == crate::domain::BufferRole::Output)
}
