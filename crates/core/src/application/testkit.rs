// Shared fixtures for application-layer unit tests

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::instance::{
    Instance, JobSpec, MachineSpec, OperationSpec, TransportSpec, TravelTime,
};
use crate::domain::{BufferDiscipline, State, TimeSource};

pub fn machine_spec(id: &str) -> MachineSpec {
    MachineSpec {
        id: id.to_string(),
        setup_times: vec![],
        prebuffer_capacity: 100,
        prebuffer_discipline: BufferDiscipline::Fifo,
        postbuffer_capacity: 100,
        postbuffer_discipline: BufferDiscipline::Fifo,
        outages: vec![],
    }
}

pub fn job_spec(id: &str, route: &[(&str, u64)]) -> JobSpec {
    JobSpec {
        id: id.to_string(),
        operations: route
            .iter()
            .map(|(machine, duration)| OperationSpec {
                machine_id: machine.to_string(),
                duration: TimeSource::constant(*duration),
                tool: None,
            })
            .collect(),
        location: None,
    }
}

pub fn zero_travel(locations: &[&str]) -> Vec<TravelTime> {
    let mut times = vec![];
    for (i, from) in locations.iter().enumerate() {
        for to in locations.iter().skip(i + 1) {
            times.push(TravelTime {
                from: from.to_string(),
                to: to.to_string(),
                duration: TimeSource::constant(0),
            });
        }
    }
    times
}

/// Two machines, one transport, the classical 2x2 routing:
/// j-0: (m-0, 3)(m-1, 2), j-1: (m-1, 2)(m-0, 4). Zero travel times.
pub fn two_machine_shop() -> (Instance, State) {
    let instance = Instance {
        description: "2x2 test shop".into(),
        machines: vec![machine_spec("m-0"), machine_spec("m-1")],
        transports: vec![TransportSpec {
            id: "t-0".into(),
            location: "in-buf".into(),
            outages: vec![],
        }],
        jobs: vec![
            job_spec("j-0", &[("m-0", 3), ("m-1", 2)]),
            job_spec("j-1", &[("m-1", 2), ("m-0", 4)]),
        ],
        buffers: vec![],
        travel_times: zero_travel(&["in-buf", "m-0", "m-1", "out-buf"]),
    }
    .normalized();
    instance.validate().expect("fixture instance is valid");
    let mut rng = StdRng::seed_from_u64(0);
    let state = State::initial(&instance, &mut rng).expect("fixture state builds");
    (instance, state)
}

/// Test-only shortcut: teleport a job into a buffer, bypassing handlers.
pub fn relocate(state: &mut State, job_id: &str, buffer_id: &str) {
    for buffer in &mut state.buffers {
        buffer.store.retain(|j| j != job_id);
    }
    state
        .buffers
        .iter_mut()
        .find(|b| b.id == buffer_id)
        .expect("relocate target exists")
        .store
        .push(job_id.to_string());
    state
        .jobs
        .iter_mut()
        .find(|j| j.id == job_id)
        .expect("relocate job exists")
        .location = buffer_id.to_string();
}
