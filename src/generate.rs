//! Caller-side generation strategy.
//!
//! The orchestrated workflow is preferred, but never required: when the
//! service cannot be reached at all, one Coder call plans and implements
//! the whole task in a single pass.

use std::time::Duration;

use tracing::{info, warn};

use crate::anthropic::MessageSender;
use crate::api::WorkflowStatusResponse;
use crate::client::OrchestratorClient;
use crate::error::{GenerateError, WorkerError};
use crate::state_machine::{FileMap, WorkflowStatus};
use crate::workers::WorkerSettings;
use crate::workers::coder::{self, CodeRequest};

/// Subtask sent to the Coder when there is no planner in front of it.
pub const ONE_SHOT_SUBTASK: &str = "Plan and implement the complete task in one pass";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPath {
    Orchestrated,
    OneShot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedProject {
    pub files: FileMap,
    pub explanation: Option<String>,
    pub path: GenerationPath,
    /// Set on the orchestrated path.
    pub workflow_id: Option<String>,
    /// Reviewer verdict; `None` on the one-shot path.
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Single synchronous Coder call covering the whole task.
pub async fn one_shot<C: MessageSender>(
    model: &C,
    settings: &WorkerSettings,
    task: &str,
    framework: &str,
) -> Result<GeneratedProject, WorkerError> {
    let req = CodeRequest::new(ONE_SHOT_SUBTASK, framework).with_task(task);
    let output = coder::generate(model, settings, &req).await?;
    Ok(GeneratedProject {
        files: output.files,
        explanation: output.explanation,
        path: GenerationPath::OneShot,
        workflow_id: None,
        approved: None,
    })
}

/// Runs `task` through the orchestration service, falling back to
/// [`one_shot`] if the service is unreachable.
///
/// Only [`ClientError::Unavailable`] triggers the fallback. Service errors,
/// poll timeouts and failed workflows are returned as is.
pub async fn generate<C, F>(
    service: &OrchestratorClient,
    model: &C,
    settings: &WorkerSettings,
    task: &str,
    framework: &str,
    wait: WaitOptions,
    observer: F,
) -> Result<GeneratedProject, GenerateError>
where
    C: MessageSender,
    F: FnMut(&WorkflowStatusResponse),
{
    match orchestrated(service, task, framework, wait, observer).await {
        Err(GenerateError::Orchestrator(err)) if err.is_unavailable() => {
            warn!(%err, "orchestration service unavailable; falling back to single-shot generation");
            Ok(one_shot(model, settings, task, framework).await?)
        }
        other => other,
    }
}

async fn orchestrated<F>(
    service: &OrchestratorClient,
    task: &str,
    framework: &str,
    wait: WaitOptions,
    observer: F,
) -> Result<GeneratedProject, GenerateError>
where
    F: FnMut(&WorkflowStatusResponse),
{
    let started = service.start_workflow(task, framework).await?;
    let id = started.workflow_id;
    info!(workflow_id = %id, url = service.base_url(), "workflow submitted");

    let status = service
        .wait_for_completion_with(&id, wait.poll_interval, wait.max_wait, observer)
        .await?;
    if status.status == WorkflowStatus::Failed {
        return Err(GenerateError::WorkflowFailed {
            id,
            error: status.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    let result = service.get_result(&id).await?;
    Ok(GeneratedProject {
        files: result.files,
        explanation: result.explanation,
        path: GenerationPath::Orchestrated,
        workflow_id: Some(id),
        approved: result.approved,
    })
}
