// Domain Layer - Pure value types and invariants

pub mod buffer;
pub mod error;
pub mod instance;
pub mod job;
pub mod machine;
pub mod operation;
pub mod outage;
pub mod state;
pub mod time;
pub mod time_source;
pub mod transition;
pub mod transport;

// Re-exports
pub use buffer::{BufferDiscipline, BufferId, BufferRole, BufferState, ComponentId};
pub use error::DomainError;
pub use instance::{
    BufferSpec, Instance, JobSpec, MachineSpec, OperationSpec, SetupTime, TransportSpec,
    TravelTime, INPUT_BUFFER_ID, OUTPUT_BUFFER_ID,
};
pub use job::{Job, JobId, LocationId};
pub use machine::{MachineId, MachinePhase, MachineState};
pub use operation::{Operation, OperationId, OperationState, ToolId};
pub use outage::{ActiveOutage, OutageKind, OutageSchedule, PendingOutage};
pub use state::{History, HistoryRecord, State};
pub use time::{Duration, Occupied, Time, TimeDependency};
pub use time_source::TimeSource;
pub use transition::ComponentTransition;
pub use transport::{TransportId, TransportPhase, TransportState};
