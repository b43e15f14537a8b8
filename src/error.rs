use std::time::Duration;

use thiserror::Error;

use crate::anthropic::AnthropicError;
use crate::state_machine::WorkflowStatus;
use crate::workers::WorkerRole;

/// A worker invocation that did not produce usable output.
///
/// Both variants are hard failures for the engine: the job moves to
/// `failed` with the rendered message recorded.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The model answered, but the answer did not satisfy the worker's schema.
    #[error("{worker} response violated its contract: {reason}")]
    PromptContractViolation { worker: WorkerRole, reason: String },

    /// The model endpoint could not be called successfully.
    #[error("{worker} call failed: {source}")]
    WorkerFailure {
        worker: WorkerRole,
        #[source]
        source: AnthropicError,
    },
}

impl WorkerError {
    pub fn violation(worker: WorkerRole, reason: impl Into<String>) -> Self {
        WorkerError::PromptContractViolation {
            worker,
            reason: reason.into(),
        }
    }

    pub fn worker(&self) -> WorkerRole {
        match self {
            WorkerError::PromptContractViolation { worker, .. }
            | WorkerError::WorkerFailure { worker, .. } => *worker,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Internal(String),
}

/// An event the state machine refused. The job is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("workflow is already {0}; no further transitions")]
    Terminal(WorkflowStatus),

    #[error("event `{event}` is not valid in state `{state}`")]
    InvalidEvent {
        state: WorkflowStatus,
        event: &'static str,
    },
}

/// Failures seen by consumers of the orchestration service.
///
/// Only [`Unavailable`](ClientError::Unavailable) means the service process
/// could not be reached; callers use that distinction to decide whether to
/// fall back to single-shot generation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("orchestration service unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("orchestration service returned {status} ({code}): {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("workflow {id} is not finished yet (status: {status})")]
    NotReady { id: String, status: WorkflowStatus },

    #[error("workflow {id} did not finish within {waited:?}")]
    Timeout { id: String, waited: Duration },

    #[error("invalid orchestration service URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::Unavailable { .. })
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Orchestrator(#[from] ClientError),

    #[error("workflow {id} failed: {error}")]
    WorkflowFailed { id: String, error: String },

    #[error("single-shot generation failed: {0}")]
    OneShot(#[from] WorkerError),
}
