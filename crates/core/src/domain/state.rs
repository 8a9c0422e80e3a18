// State Value and History

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::domain::buffer::{BufferDiscipline, BufferRole, BufferState};
use crate::domain::error::Result;
use crate::domain::instance::Instance;
use crate::domain::job::Job;
use crate::domain::machine::{MachinePhase, MachineState};
use crate::domain::operation::{Operation, OperationState};
use crate::domain::outage::PendingOutage;
use crate::domain::time::{Occupied, Time};
use crate::domain::transition::ComponentTransition;
use crate::domain::transport::{TransportPhase, TransportState};

/// Immutable simulation state. Every transition produces a new value; the
/// previous one is retained in the append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub time: Time,
    pub machines: Vec<MachineState>,
    pub transports: Vec<TransportState>,
    pub jobs: Vec<Job>,
    pub buffers: Vec<BufferState>,
    pub pending_outages: Vec<PendingOutage>,
}

impl State {
    /// Build the initial state from a normalized, validated instance.
    ///
    /// Outage occurrences are pre-sampled here, machines before transports,
    /// schedules in declaration order, so replays with the same seed see
    /// the same occurrences.
    pub fn initial(instance: &Instance, rng: &mut StdRng) -> Result<State> {
        let input_buffer = instance.input_buffer_id()?;

        let mut buffers: Vec<BufferState> = Vec::new();
        for machine in &instance.machines {
            buffers.push(BufferState {
                id: machine.prebuffer_id(),
                discipline: machine.prebuffer_discipline,
                role: BufferRole::Component,
                capacity: machine.prebuffer_capacity,
                parent: Some(machine.id.clone()),
                store: vec![],
            });
            buffers.push(BufferState {
                id: machine.buffer_id(),
                discipline: BufferDiscipline::Dummy,
                role: BufferRole::Component,
                capacity: 1,
                parent: Some(machine.id.clone()),
                store: vec![],
            });
            buffers.push(BufferState {
                id: machine.postbuffer_id(),
                discipline: machine.postbuffer_discipline,
                role: BufferRole::Component,
                capacity: machine.postbuffer_capacity,
                parent: Some(machine.id.clone()),
                store: vec![],
            });
        }
        for spec in &instance.buffers {
            buffers.push(BufferState {
                id: spec.id.clone(),
                discipline: spec.discipline,
                role: spec.role,
                capacity: spec.capacity,
                parent: spec.parent.clone(),
                store: vec![],
            });
        }

        let mut jobs: Vec<Job> = Vec::new();
        for spec in &instance.jobs {
            let location = spec.location.clone().unwrap_or_else(|| input_buffer.clone());
            let operations = spec
                .operations
                .iter()
                .enumerate()
                .map(|(k, op)| Operation {
                    id: format!("{}-op-{}", spec.id, k),
                    machine_id: op.machine_id.clone(),
                    tool: op.tool.clone(),
                    state: OperationState::Idle,
                })
                .collect();
            let buffer = buffers
                .iter_mut()
                .find(|b| b.id == location)
                .ok_or_else(|| {
                    crate::domain::error::DomainError::InvalidValue(format!(
                        "job {} starts at unknown buffer {}",
                        spec.id, location
                    ))
                })?;
            buffer.store.push(spec.id.clone());
            jobs.push(Job {
                id: spec.id.clone(),
                operations,
                location,
            });
        }

        let machines = instance
            .machines
            .iter()
            .map(|spec| MachineState {
                id: spec.id.clone(),
                phase: MachinePhase::Idle,
                current_operation: None,
                current_tool: None,
                occupied_till: Occupied::Free,
                prebuffer_id: spec.prebuffer_id(),
                buffer_id: spec.buffer_id(),
                postbuffer_id: spec.postbuffer_id(),
                active_outage: None,
            })
            .collect();

        let transports = instance
            .transports
            .iter()
            .map(|spec| TransportState {
                id: spec.id.clone(),
                phase: TransportPhase::Idle,
                location: spec.location.clone(),
                transport_job: None,
                occupied_till: Occupied::Free,
                dropoff_buffer_id: None,
                active_outage: None,
            })
            .collect();

        let mut pending_outages = Vec::new();
        for machine in &instance.machines {
            for (idx, schedule) in machine.outages.iter().enumerate() {
                pending_outages.push(PendingOutage {
                    component_id: machine.id.clone(),
                    schedule_idx: idx,
                    kind: schedule.kind,
                    due_at: Time(schedule.frequency.sample(rng)),
                    duration: schedule.duration.sample(rng),
                });
            }
        }
        for transport in &instance.transports {
            for (idx, schedule) in transport.outages.iter().enumerate() {
                pending_outages.push(PendingOutage {
                    component_id: transport.id.clone(),
                    schedule_idx: idx,
                    kind: schedule.kind,
                    due_at: Time(schedule.frequency.sample(rng)),
                    duration: schedule.duration.sample(rng),
                });
            }
        }

        Ok(State {
            time: Time::ZERO,
            machines,
            transports,
            jobs,
            buffers,
            pending_outages,
        })
    }

    /// All jobs delivered: every job sits in an OUTPUT-role buffer.
    pub fn is_done(&self) -> bool {
        self.jobs.iter().all(|job| {
            self.buffers
                .iter()
                .any(|b| b.role == BufferRole::Output && b.id == job.location)
        })
    }
}

/// One applied engine step: the transitions that fired, a human-readable
/// message, and the state they produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub time: Time,
    pub transitions: Vec<ComponentTransition>,
    pub message: String,
    pub state: State,
}

/// Append-only run history. Never consulted by the engine for correctness;
/// renderers read it from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub initial: State,
    pub records: Vec<HistoryRecord>,
}

impl History {
    pub fn new(initial: State) -> Self {
        History {
            initial,
            records: vec![],
        }
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn last_state(&self) -> &State {
        self.records
            .last()
            .map(|r| &r.state)
            .unwrap_or(&self.initial)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// (old, new) state pairs in application order, for renderers.
    pub fn pairs(&self) -> impl Iterator<Item = (&State, &HistoryRecord)> {
        std::iter::once(&self.initial)
            .chain(self.records.iter().map(|r| &r.state))
            .zip(self.records.iter())
    }

    /// Every transition applied over the run, in order.
    pub fn transitions(&self) -> Vec<ComponentTransition> {
        self.records
            .iter()
            .flat_map(|r| r.transitions.iter().cloned())
            .collect()
    }
}
