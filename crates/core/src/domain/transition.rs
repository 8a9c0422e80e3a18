// Component Transition Vocabulary

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;
use crate::domain::machine::{MachineId, MachinePhase};
use crate::domain::transport::{TransportId, TransportPhase};

/// A tagged transition request for a single component.
///
/// Legal machine sequences: IDLE -> SETUP -> WORKING -> IDLE with OUTAGE
/// reachable from each working phase. Legal transport sequences:
/// IDLE -> PICKUP -> WORKING -> IDLE with IDLE <-> OUTAGE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "component")]
pub enum ComponentTransition {
    Machine {
        machine_id: MachineId,
        target: MachinePhase,
        job_id: Option<JobId>,
    },
    Transport {
        transport_id: TransportId,
        target: TransportPhase,
        job_id: Option<JobId>,
    },
}

impl ComponentTransition {
    pub fn machine(machine_id: impl Into<String>, target: MachinePhase, job_id: Option<JobId>) -> Self {
        ComponentTransition::Machine {
            machine_id: machine_id.into(),
            target,
            job_id,
        }
    }

    pub fn transport(
        transport_id: impl Into<String>,
        target: TransportPhase,
        job_id: Option<JobId>,
    ) -> Self {
        ComponentTransition::Transport {
            transport_id: transport_id.into(),
            target,
            job_id,
        }
    }

    pub fn component_id(&self) -> &str {
        match self {
            ComponentTransition::Machine { machine_id, .. } => machine_id,
            ComponentTransition::Transport { transport_id, .. } => transport_id,
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            ComponentTransition::Machine { job_id, .. } => job_id.as_ref(),
            ComponentTransition::Transport { job_id, .. } => job_id.as_ref(),
        }
    }
}

impl std::fmt::Display for ComponentTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentTransition::Machine {
                machine_id,
                target,
                job_id,
            } => match job_id {
                Some(job) => write!(f, "{} -> {} ({})", machine_id, target, job),
                None => write!(f, "{} -> {}", machine_id, target),
            },
            ComponentTransition::Transport {
                transport_id,
                target,
                job_id,
            } => match job_id {
                Some(job) => write!(f, "{} -> {} ({})", transport_id, target, job),
                None => write!(f, "{} -> {}", transport_id, target),
            },
        }
    }
}
