// Job Progression and Transport Eligibility

use crate::application::query;
use crate::domain::error::{DomainError, Result};
use crate::domain::{BufferId, Instance, Job, MachineId, State};

/// Outcome of the four-case transportability decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transportability {
    /// Delivered, or already where it needs to be
    No,
    /// All operations done; bring it to the output buffer
    ToOutput,
    /// Bring it to the machine of its next idle operation
    ToMachine(MachineId),
}

impl Transportability {
    pub fn is_transportable(&self) -> bool {
        !matches!(self, Transportability::No)
    }
}

/// Decide whether a job needs transport, and where to.
///
/// Cases, evaluated in order: delivered jobs stay; finished-but-undelivered
/// jobs go to the output; jobs with an operation in flight stay on their
/// machine until it completes; jobs already at the machine of their next
/// idle operation stay; everything else goes to that machine. A job with
/// no idle, no processing operation that is not all-done has no consistent
/// reading.
pub fn is_transportable(job: &Job, state: &State, instance: &Instance) -> Result<Transportability> {
    if query::is_output_buffer(state, &job.location) {
        return Ok(Transportability::No);
    }
    if job.all_operations_done() {
        return Ok(Transportability::ToOutput);
    }
    if job.has_processing_operation() {
        // Being worked on right now; later idle operations do not make it
        // pickable before the machine releases it
        return Ok(Transportability::No);
    }
    if let Some((_, next)) = job.next_idle_operation() {
        let machine = instance.machine_spec(&next.machine_id)?;
        let at_machine = job.location == machine.id
            || job.location == machine.prebuffer_id()
            || job.location == machine.buffer_id()
            || job.location == machine.postbuffer_id();
        if at_machine {
            return Ok(Transportability::No);
        }
        return Ok(Transportability::ToMachine(next.machine_id.clone()));
    }
    Err(DomainError::InconsistentState(format!(
        "job {} has no idle operation but is not done",
        job.id
    )))
}

/// Destination buffer for a transport's loaded leg.
pub fn dropoff_buffer(job: &Job, instance: &Instance) -> Result<BufferId> {
    match job.next_idle_operation() {
        None => instance.output_buffer_id(),
        Some((_, next)) => Ok(instance.machine_spec(&next.machine_id)?.prebuffer_id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;
    use crate::domain::OperationState;

    #[test]
    fn job_in_output_buffer_is_not_transportable() {
        let (instance, mut state) = testkit::two_machine_shop();
        testkit::relocate(&mut state, "j-0", "out-buf");
        let job = query::job(&state, "j-0").unwrap().clone();
        assert_eq!(
            is_transportable(&job, &state, &instance).unwrap(),
            Transportability::No
        );
    }

    #[test]
    fn finished_job_outside_output_goes_to_output() {
        let (instance, mut state) = testkit::two_machine_shop();
        for op in &mut query::job_mut(&mut state, "j-0").unwrap().operations {
            op.state = OperationState::Done;
        }
        let job = query::job(&state, "j-0").unwrap().clone();
        assert_eq!(
            is_transportable(&job, &state, &instance).unwrap(),
            Transportability::ToOutput
        );
        assert_eq!(dropoff_buffer(&job, &instance).unwrap(), "out-buf");
    }

    #[test]
    fn job_already_at_next_machine_stays() {
        let (instance, mut state) = testkit::two_machine_shop();
        testkit::relocate(&mut state, "j-0", "m-0-pre");
        let job = query::job(&state, "j-0").unwrap().clone();
        assert_eq!(
            is_transportable(&job, &state, &instance).unwrap(),
            Transportability::No
        );
    }

    #[test]
    fn waiting_job_targets_next_machine() {
        let (instance, state) = testkit::two_machine_shop();
        let job = query::job(&state, "j-0").unwrap().clone();
        assert_eq!(
            is_transportable(&job, &state, &instance).unwrap(),
            Transportability::ToMachine("m-0".into())
        );
        assert_eq!(dropoff_buffer(&job, &instance).unwrap(), "m-0-pre");
    }

    #[test]
    fn job_mid_processing_with_further_operations_stays_put() {
        let (instance, mut state) = testkit::two_machine_shop();
        // j-0 is being worked on by m-0 while its second operation
        // targets m-1; it must not be pickable until m-0 releases it
        testkit::relocate(&mut state, "j-0", "m-0-buf");
        query::job_mut(&mut state, "j-0").unwrap().operations[0].state =
            OperationState::Processing;

        let job = query::job(&state, "j-0").unwrap().clone();
        assert_eq!(
            is_transportable(&job, &state, &instance).unwrap(),
            Transportability::No
        );
    }

    #[test]
    fn job_processing_its_last_operation_is_not_transportable() {
        let (instance, mut state) = testkit::two_machine_shop();
        testkit::relocate(&mut state, "j-0", "m-1-buf");
        {
            let job = query::job_mut(&mut state, "j-0").unwrap();
            job.operations[0].state = OperationState::Done;
            job.operations[1].state = OperationState::Processing;
        }

        let job = query::job(&state, "j-0").unwrap().clone();
        assert_eq!(
            is_transportable(&job, &state, &instance).unwrap(),
            Transportability::No,
            "finishing the last operation is an ordinary state, not an error"
        );
    }
}
