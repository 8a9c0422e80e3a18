// Buffer Ordering and Movement

use crate::application::query;
use crate::domain::error::{DomainError, Result};
use crate::domain::{BufferDiscipline, BufferRole, BufferState, JobId, State};

/// The job at the single pickupable head position, as defined by the
/// discipline. FLEX buffers have no single head (any position is legal).
pub fn head_job(buffer: &BufferState) -> Option<&JobId> {
    match buffer.discipline {
        BufferDiscipline::Fifo | BufferDiscipline::Dummy => buffer.store.first(),
        BufferDiscipline::Lifo => buffer.store.last(),
        BufferDiscipline::Flex => None,
    }
}

/// Whether `job_id` may be taken from this buffer right now.
pub fn can_pick(buffer: &BufferState, job_id: &str) -> bool {
    match buffer.discipline {
        BufferDiscipline::Flex => buffer.contains(job_id),
        _ => head_job(buffer).map(|j| j == job_id).unwrap_or(false),
    }
}

/// The job standing between `job_id` and the head position, if any.
/// Present exactly when the job is stored but not currently pickable.
pub fn blocking_job(buffer: &BufferState, job_id: &str) -> Option<JobId> {
    if !buffer.contains(job_id) || can_pick(buffer, job_id) {
        return None;
    }
    head_job(buffer).cloned()
}

/// Remove a job from a buffer. The caller owns updating `job.location`.
pub fn take(state: &mut State, buffer_id: &str, job_id: &str) -> Result<()> {
    let buffer = query::buffer_mut(state, buffer_id)?;
    if buffer.role == BufferRole::Output {
        // Output-buffer terminality: delivered jobs never leave
        return Err(DomainError::InconsistentState(format!(
            "attempted to remove {} from output buffer {}",
            job_id, buffer_id
        )));
    }
    if !can_pick(buffer, job_id) {
        return Err(DomainError::invalid_transition(
            buffer_id,
            format!("{} is not at the head position", job_id),
        ));
    }
    buffer.store.retain(|j| j != job_id);
    Ok(())
}

/// Insert a job at the back of a buffer and update its location.
pub fn put(state: &mut State, buffer_id: &str, job_id: &str) -> Result<()> {
    let buffer = query::buffer_mut(state, buffer_id)?;
    if buffer.is_full() {
        return Err(DomainError::invalid_transition(
            buffer_id,
            format!("buffer full, cannot store {}", job_id),
        ));
    }
    buffer.store.push(job_id.to_string());
    query::job_mut(state, job_id)?.location = buffer_id.to_string();
    Ok(())
}

/// Move a job between two buffers in one step.
pub fn transfer(state: &mut State, from: &str, to: &str, job_id: &str) -> Result<()> {
    take(state, from, job_id)?;
    put(state, to, job_id)
}
