// Validated Instance Value
//
// The textual instance language and its parser live outside the core; what
// arrives here is already structured data (typically via serde_json).

use serde::{Deserialize, Serialize};

use crate::domain::buffer::{BufferDiscipline, BufferId, BufferRole, ComponentId};
use crate::domain::error::{DomainError, Result};
use crate::domain::job::{JobId, LocationId};
use crate::domain::machine::MachineId;
use crate::domain::operation::ToolId;
use crate::domain::outage::OutageSchedule;
use crate::domain::time::Duration;
use crate::domain::time_source::TimeSource;
use crate::domain::transport::TransportId;

/// Reserved id of the system-default input buffer
pub const INPUT_BUFFER_ID: &str = "in-buf";
/// Reserved id of the system-default output buffer
pub const OUTPUT_BUFFER_ID: &str = "out-buf";

const INPUT_ALIASES: [&str; 3] = ["in-buf", "input", "input-buffer"];
const OUTPUT_ALIASES: [&str; 3] = ["out-buf", "output", "output-buffer"];

fn default_buffer_capacity() -> usize {
    100
}

fn default_discipline() -> BufferDiscipline {
    BufferDiscipline::Fifo
}

/// One entry of a machine's setup-times table, keyed (from_tool, to_tool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupTime {
    pub from_tool: ToolId,
    pub to_tool: ToolId,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub id: MachineId,
    #[serde(default)]
    pub setup_times: Vec<SetupTime>,
    #[serde(default = "default_buffer_capacity")]
    pub prebuffer_capacity: usize,
    #[serde(default = "default_discipline")]
    pub prebuffer_discipline: BufferDiscipline,
    #[serde(default = "default_buffer_capacity")]
    pub postbuffer_capacity: usize,
    #[serde(default = "default_discipline")]
    pub postbuffer_discipline: BufferDiscipline,
    #[serde(default)]
    pub outages: Vec<OutageSchedule>,
}

impl MachineSpec {
    pub fn prebuffer_id(&self) -> BufferId {
        format!("{}-pre", self.id)
    }

    pub fn buffer_id(&self) -> BufferId {
        format!("{}-buf", self.id)
    }

    pub fn postbuffer_id(&self) -> BufferId {
        format!("{}-post", self.id)
    }

    /// Setup duration for a tool change. Pairs missing from the table and
    /// changes from "no tool" cost nothing.
    pub fn setup_duration(&self, from: Option<&ToolId>, to: Option<&ToolId>) -> Duration {
        let (Some(from), Some(to)) = (from, to) else {
            return 0;
        };
        if from == to {
            return 0;
        }
        self.setup_times
            .iter()
            .find(|s| &s.from_tool == from && &s.to_tool == to)
            .map(|s| s.duration)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSpec {
    pub id: TransportId,
    pub location: LocationId,
    #[serde(default)]
    pub outages: Vec<OutageSchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub machine_id: MachineId,
    pub duration: TimeSource,
    #[serde(default)]
    pub tool: Option<ToolId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub operations: Vec<OperationSpec>,
    /// Initial location; defaults to the input buffer
    #[serde(default)]
    pub location: Option<LocationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSpec {
    pub id: BufferId,
    #[serde(default = "default_discipline")]
    pub discipline: BufferDiscipline,
    pub role: BufferRole,
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub parent: Option<ComponentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTime {
    pub from: LocationId,
    pub to: LocationId,
    pub duration: TimeSource,
}

/// Everything the core consumes: machines, transports, jobs, standalone
/// buffers, setup and travel matrices, outage schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub description: String,
    pub machines: Vec<MachineSpec>,
    #[serde(default)]
    pub transports: Vec<TransportSpec>,
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub buffers: Vec<BufferSpec>,
    #[serde(default)]
    pub travel_times: Vec<TravelTime>,
}

impl Instance {
    /// Inject system-default input/output buffers when none are declared
    /// and rewrite reserved location aliases to the canonical buffer ids.
    pub fn normalized(mut self) -> Instance {
        if !self.buffers.iter().any(|b| b.role == BufferRole::Input) {
            self.buffers.push(BufferSpec {
                id: INPUT_BUFFER_ID.to_string(),
                discipline: BufferDiscipline::Flex,
                role: BufferRole::Input,
                capacity: default_buffer_capacity(),
                parent: None,
            });
        }
        if !self.buffers.iter().any(|b| b.role == BufferRole::Output) {
            self.buffers.push(BufferSpec {
                id: OUTPUT_BUFFER_ID.to_string(),
                discipline: BufferDiscipline::Flex,
                role: BufferRole::Output,
                capacity: default_buffer_capacity(),
                parent: None,
            });
        }

        let input = self.role_buffer_id(BufferRole::Input);
        let output = self.role_buffer_id(BufferRole::Output);
        let resolve = |loc: &mut LocationId| {
            if INPUT_ALIASES.contains(&loc.as_str()) {
                if let Some(input) = &input {
                    *loc = input.clone();
                }
            } else if OUTPUT_ALIASES.contains(&loc.as_str()) {
                if let Some(output) = &output {
                    *loc = output.clone();
                }
            }
        };

        for job in &mut self.jobs {
            if let Some(loc) = &mut job.location {
                resolve(loc);
            }
        }
        for transport in &mut self.transports {
            resolve(&mut transport.location);
        }
        for travel in &mut self.travel_times {
            resolve(&mut travel.from);
            resolve(&mut travel.to);
        }
        self
    }

    fn role_buffer_id(&self, role: BufferRole) -> Option<BufferId> {
        self.buffers
            .iter()
            .find(|b| b.role == role)
            .map(|b| b.id.clone())
    }

    /// Structural checks. Call on a normalized instance.
    pub fn validate(&self) -> Result<()> {
        if self.machines.is_empty() {
            return Err(DomainError::InvalidValue("instance has no machines".into()));
        }
        if self.jobs.is_empty() {
            return Err(DomainError::InvalidValue("instance has no jobs".into()));
        }

        let mut ids: Vec<&str> = Vec::new();
        for id in self
            .machines
            .iter()
            .map(|m| m.id.as_str())
            .chain(self.transports.iter().map(|t| t.id.as_str()))
            .chain(self.jobs.iter().map(|j| j.id.as_str()))
            .chain(self.buffers.iter().map(|b| b.id.as_str()))
        {
            if ids.contains(&id) {
                return Err(DomainError::InvalidValue(format!("duplicate id: {}", id)));
            }
            ids.push(id);
        }

        for machine in &self.machines {
            if machine.prebuffer_capacity < 1 || machine.postbuffer_capacity < 1 {
                return Err(DomainError::InvalidValue(format!(
                    "machine {} declares a zero-capacity buffer",
                    machine.id
                )));
            }
            for setup in &machine.setup_times {
                if setup.from_tool == setup.to_tool && setup.duration != 0 {
                    return Err(DomainError::InvalidValue(format!(
                        "machine {} declares non-zero setup {} -> {} ({})",
                        machine.id, setup.from_tool, setup.to_tool, setup.duration
                    )));
                }
            }
        }

        for (component, outages) in self
            .machines
            .iter()
            .map(|m| (&m.id, &m.outages))
            .chain(self.transports.iter().map(|t| (&t.id, &t.outages)))
        {
            for outage in outages {
                if outage.frequency.expected() == 0 {
                    return Err(DomainError::InvalidValue(format!(
                        "{} declares an outage with zero frequency",
                        component
                    )));
                }
            }
        }

        for buffer in &self.buffers {
            if buffer.capacity < 1 {
                return Err(DomainError::InvalidValue(format!(
                    "buffer {} has zero capacity",
                    buffer.id
                )));
            }
        }

        for job in &self.jobs {
            if job.operations.is_empty() {
                return Err(DomainError::InvalidValue(format!(
                    "job {} has no operations",
                    job.id
                )));
            }
            for op in &job.operations {
                if !self.machines.iter().any(|m| m.id == op.machine_id) {
                    return Err(DomainError::InvalidValue(format!(
                        "job {} references unknown machine {}",
                        job.id, op.machine_id
                    )));
                }
            }
            if let Some(location) = &job.location {
                if !self.buffers.iter().any(|b| &b.id == location) {
                    return Err(DomainError::InvalidValue(format!(
                        "job {} starts at unknown buffer {}",
                        job.id, location
                    )));
                }
            }
        }

        for transport in &self.transports {
            let known = self.machines.iter().any(|m| m.id == transport.location)
                || self.buffers.iter().any(|b| b.id == transport.location);
            if !known {
                return Err(DomainError::InvalidValue(format!(
                    "transport {} starts at unknown location {}",
                    transport.id, transport.location
                )));
            }
        }

        Ok(())
    }

    pub fn machine_spec(&self, id: &str) -> Result<&MachineSpec> {
        self.machines
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| DomainError::InvalidValue(format!("unknown machine: {}", id)))
    }

    pub fn transport_spec(&self, id: &str) -> Result<&TransportSpec> {
        self.transports
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| DomainError::InvalidValue(format!("unknown transport: {}", id)))
    }

    pub fn job_spec(&self, id: &str) -> Result<&JobSpec> {
        self.jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| DomainError::InvalidValue(format!("unknown job: {}", id)))
    }

    pub fn operation_spec(&self, job_id: &str, index: usize) -> Result<&OperationSpec> {
        let job = self.job_spec(job_id)?;
        job.operations.get(index).ok_or_else(|| {
            DomainError::InvalidValue(format!("job {} has no operation {}", job_id, index))
        })
    }

    pub fn input_buffer_id(&self) -> Result<BufferId> {
        self.role_buffer_id(BufferRole::Input)
            .ok_or_else(|| DomainError::InvalidValue("instance has no input buffer".into()))
    }

    pub fn output_buffer_id(&self) -> Result<BufferId> {
        self.role_buffer_id(BufferRole::Output)
            .ok_or_else(|| DomainError::InvalidValue("instance has no output buffer".into()))
    }

    /// Map a location onto the travel-matrix key space: buffers owned by a
    /// machine collapse onto the machine id, everything else is itself.
    pub fn travel_location(&self, location: &str) -> LocationId {
        for machine in &self.machines {
            if location == machine.id
                || location == machine.prebuffer_id()
                || location == machine.buffer_id()
                || location == machine.postbuffer_id()
            {
                return machine.id.clone();
            }
        }
        location.to_string()
    }

    /// Travel-time source between two locations. Symmetric fallback; zero
    /// for same-location moves.
    pub fn travel_time(&self, from: &str, to: &str) -> Result<TimeSource> {
        let from = self.travel_location(from);
        let to = self.travel_location(to);
        if from == to {
            return Ok(TimeSource::constant(0));
        }
        self.travel_times
            .iter()
            .find(|t| (t.from == from && t.to == to) || (t.from == to && t.to == from))
            .map(|t| t.duration.clone())
            .ok_or_else(|| {
                DomainError::InvalidValue(format!("no travel time for {} -> {}", from, to))
            })
    }

    pub fn total_operations(&self) -> usize {
        self.jobs.iter().map(|j| j.operations.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Instance {
        Instance {
            description: String::new(),
            machines: vec![MachineSpec {
                id: "m-0".into(),
                setup_times: vec![],
                prebuffer_capacity: default_buffer_capacity(),
                prebuffer_discipline: BufferDiscipline::Fifo,
                postbuffer_capacity: default_buffer_capacity(),
                postbuffer_discipline: BufferDiscipline::Fifo,
                outages: vec![],
            }],
            transports: vec![],
            jobs: vec![JobSpec {
                id: "j-0".into(),
                operations: vec![OperationSpec {
                    machine_id: "m-0".into(),
                    duration: TimeSource::constant(3),
                    tool: None,
                }],
                location: Some("input".into()),
            }],
            buffers: vec![],
            travel_times: vec![],
        }
    }

    #[test]
    fn normalized_injects_default_buffers_and_resolves_aliases() {
        let instance = minimal().normalized();
        assert_eq!(instance.input_buffer_id().unwrap(), INPUT_BUFFER_ID);
        assert_eq!(instance.output_buffer_id().unwrap(), OUTPUT_BUFFER_ID);
        assert_eq!(
            instance.jobs[0].location.as_deref(),
            Some(INPUT_BUFFER_ID),
            "alias 'input' must resolve to the default input buffer"
        );
        assert!(instance.validate().is_ok());
    }

    #[test]
    fn validate_rejects_nonzero_setup_diagonal() {
        let mut instance = minimal();
        instance.machines[0].setup_times.push(SetupTime {
            from_tool: "tl-0".into(),
            to_tool: "tl-0".into(),
            duration: 4,
        });
        let err = instance.normalized().validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue(_)));
    }

    #[test]
    fn validate_rejects_unknown_machine_reference() {
        let mut instance = minimal();
        instance.jobs[0].operations[0].machine_id = "m-9".into();
        let err = instance.normalized().validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue(_)));
    }

    #[test]
    fn travel_time_collapses_machine_buffers_and_is_symmetric() {
        let mut instance = minimal().normalized();
        instance.travel_times.push(TravelTime {
            from: "m-0".into(),
            to: INPUT_BUFFER_ID.into(),
            duration: TimeSource::constant(4),
        });
        let src = instance.travel_time(INPUT_BUFFER_ID, "m-0-post").unwrap();
        assert_eq!(src, TimeSource::constant(4));
        let same = instance.travel_time("m-0-pre", "m-0").unwrap();
        assert_eq!(same, TimeSource::constant(0));
    }

    #[test]
    fn setup_duration_lookup() {
        let mut spec = minimal().machines.remove(0);
        spec.setup_times.push(SetupTime {
            from_tool: "tl-0".into(),
            to_tool: "tl-1".into(),
            duration: 2,
        });
        let tl0 = Some("tl-0".to_string());
        let tl1 = Some("tl-1".to_string());
        assert_eq!(spec.setup_duration(tl0.as_ref(), tl1.as_ref()), 2);
        assert_eq!(spec.setup_duration(tl1.as_ref(), tl1.as_ref()), 0);
        assert_eq!(spec.setup_duration(None, tl1.as_ref()), 0);
    }
}
