mod job;
mod state;

pub use job::{DEFAULT_MAX_ITERATIONS, FileMap, WorkflowJob};
pub use state::{Event, StateMachine, Transition, WorkflowOutcome, WorkflowStatus};
