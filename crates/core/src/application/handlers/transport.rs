// Transport Transition Handlers

use rand::rngs::StdRng;
use tracing::debug;

use crate::application::{buffers, jobs, query};
use crate::domain::error::{DomainError, Result};
use crate::domain::{
    ComponentTransition, Instance, Occupied, State, TimeDependency, TransportPhase,
};

pub fn apply(
    state: &State,
    instance: &Instance,
    transport_id: &str,
    target: TransportPhase,
    job_id: Option<&str>,
    rng: &mut StdRng,
) -> Result<State> {
    let phase = query::transport(state, transport_id)?.phase;
    match (phase, target) {
        (TransportPhase::Idle, TransportPhase::Pickup) => {
            let job_id = job_id
                .or_else(|| {
                    // Deferred pickups carry the job in the claim
                    state
                        .transports
                        .iter()
                        .find(|t| t.id == transport_id)
                        .and_then(|t| t.transport_job.as_deref())
                })
                .ok_or_else(|| {
                    DomainError::invalid_transition(transport_id, "pickup requires a job")
                })?;
            commit(state, instance, transport_id, job_id, rng)
        }
        (TransportPhase::Pickup, TransportPhase::Working) => {
            load(state, instance, transport_id, rng)
        }
        (TransportPhase::Working, TransportPhase::Idle) => dropoff(state, instance, transport_id),
        (from, to) => Err(DomainError::NotImplemented(format!(
            "transport edge {} -> {} has no handler",
            from, to
        ))),
    }
}

/// IDLE -> PICKUP: commit to a job and start the empty leg. If the job is
/// not at the head position of its buffer the transport parks on a time
/// dependency instead of moving; the commitment (claim) stands either way.
fn commit(
    state: &State,
    instance: &Instance,
    transport_id: &str,
    job_id: &str,
    rng: &mut StdRng,
) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;

    let job_location = query::job(&next, job_id)?.location.clone();
    let buffer = query::buffer(&next, &job_location)?;

    if !buffers::can_pick(buffer, job_id) {
        let blocking = buffers::blocking_job(buffer, job_id).ok_or_else(|| {
            DomainError::invalid_transition(
                transport_id,
                format!("{} is not stored in {}", job_id, job_location),
            )
        })?;
        let deferred = ComponentTransition::transport(
            transport_id,
            TransportPhase::Pickup,
            Some(job_id.to_string()),
        );
        let transport = query::transport_mut(&mut next, transport_id)?;
        transport.transport_job = Some(job_id.to_string());
        transport.occupied_till = Occupied::Waiting(TimeDependency {
            blocking_job_id: blocking.clone(),
            buffer_id: job_location.clone(),
            deferred: Box::new(deferred),
        });
        debug!(
            transport = %transport_id,
            job = %job_id,
            blocking = %blocking,
            buffer = %job_location,
            "Pickup deferred behind head-of-queue job"
        );
        return Ok(next);
    }

    let transport = query::transport(&next, transport_id)?;
    let travel = instance
        .travel_time(&transport.location, &job_location)?
        .sample(rng);

    let transport = query::transport_mut(&mut next, transport_id)?;
    transport.phase = TransportPhase::Pickup;
    transport.transport_job = Some(job_id.to_string());
    transport.occupied_till = Occupied::AtTime(now.plus(travel));

    debug!(transport = %transport_id, job = %job_id, travel, "Transport entering PICKUP");
    Ok(next)
}

/// PICKUP -> WORKING: arrive at the job's buffer, load it and start the
/// loaded leg. A head position lost during the empty leg parks the
/// transport at the buffer on a fresh time dependency.
fn load(state: &State, instance: &Instance, transport_id: &str, rng: &mut StdRng) -> Result<State> {
    let mut next = state.clone();
    let now = next.time;

    let transport = query::transport(&next, transport_id)?;
    let job_id = transport.transport_job.clone().ok_or_else(|| {
        DomainError::InconsistentState(format!(
            "transport {} in PICKUP without a claimed job",
            transport_id
        ))
    })?;
    let job_location = query::job(&next, &job_id)?.location.clone();
    let here = instance.travel_location(&job_location);

    let buffer = query::buffer(&next, &job_location)?;
    if !buffers::can_pick(buffer, &job_id) {
        let blocking = buffers::blocking_job(buffer, &job_id).ok_or_else(|| {
            DomainError::InconsistentState(format!(
                "claimed job {} vanished from {}",
                job_id, job_location
            ))
        })?;
        let deferred = ComponentTransition::transport(
            transport_id,
            TransportPhase::Working,
            Some(job_id.clone()),
        );
        let transport = query::transport_mut(&mut next, transport_id)?;
        transport.location = here;
        transport.occupied_till = Occupied::Waiting(TimeDependency {
            blocking_job_id: blocking.clone(),
            buffer_id: job_location.clone(),
            deferred: Box::new(deferred),
        });
        debug!(
            transport = %transport_id,
            job = %job_id,
            blocking = %blocking,
            "Load deferred, head position changed during empty leg"
        );
        return Ok(next);
    }

    buffers::take(&mut next, &job_location, &job_id)?;
    query::job_mut(&mut next, &job_id)?.location = transport_id.to_string();

    let job = query::job(&next, &job_id)?;
    let dropoff = jobs::dropoff_buffer(job, instance)?;
    let destination = instance.travel_location(&dropoff);
    let travel = instance.travel_time(&here, &destination)?.sample(rng);

    let transport = query::transport_mut(&mut next, transport_id)?;
    transport.phase = TransportPhase::Working;
    transport.location = here;
    transport.dropoff_buffer_id = Some(dropoff.clone());
    transport.occupied_till = Occupied::AtTime(now.plus(travel));

    debug!(
        transport = %transport_id,
        job = %job_id,
        dropoff = %dropoff,
        travel,
        "Transport loaded, entering WORKING"
    );
    Ok(next)
}

/// WORKING -> IDLE: deliver the job into the destination buffer.
fn dropoff(state: &State, instance: &Instance, transport_id: &str) -> Result<State> {
    let mut next = state.clone();

    let transport = query::transport(&next, transport_id)?;
    let job_id = transport.transport_job.clone().ok_or_else(|| {
        DomainError::InconsistentState(format!(
            "transport {} in WORKING without a job",
            transport_id
        ))
    })?;
    let dropoff = transport.dropoff_buffer_id.clone().ok_or_else(|| {
        DomainError::InconsistentState(format!(
            "transport {} in WORKING without a destination",
            transport_id
        ))
    })?;

    buffers::put(&mut next, &dropoff, &job_id)?;

    let location = instance.travel_location(&dropoff);
    let transport = query::transport_mut(&mut next, transport_id)?;
    transport.phase = TransportPhase::Idle;
    transport.location = location;
    transport.transport_job = None;
    transport.dropoff_buffer_id = None;
    transport.occupied_till = Occupied::Free;

    debug!(transport = %transport_id, job = %job_id, buffer = %dropoff, "Transport delivered job");
    Ok(next)
}
