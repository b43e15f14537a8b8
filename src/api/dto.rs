//! Wire types for the workflow HTTP API.

use serde::{Deserialize, Serialize};

use crate::state_machine::{FileMap, WorkflowJob, WorkflowStatus};
use crate::workers::WorkerRole;

pub const DEFAULT_FRAMEWORK: &str = "react";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    pub task: String,
    /// Absent, `null` or blank selects [`DEFAULT_FRAMEWORK`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

impl StartWorkflowRequest {
    pub fn framework_or_default(&self) -> &str {
        self.framework
            .as_deref()
            .map(str::trim)
            .filter(|fw| !fw.is_empty())
            .unwrap_or(DEFAULT_FRAMEWORK)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub workflow_id: String,
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusResponse {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub current_agent: Option<WorkerRole>,
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&WorkflowJob> for WorkflowStatusResponse {
    fn from(job: &WorkflowJob) -> Self {
        Self {
            workflow_id: job.id.clone(),
            status: job.status,
            current_agent: job.current_agent,
            iteration: job.iteration,
            error: job.error.clone(),
        }
    }
}

/// Final artifact of a terminal workflow.
///
/// `approved` is `Some(false)` when the iteration cap was reached with the
/// reviewer still rejecting; `review_feedback` then holds the open issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResultResponse {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub files: FileMap,
    pub plan: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<WorkflowJob> for WorkflowResultResponse {
    fn from(job: WorkflowJob) -> Self {
        let approved = job.approved();
        let review_feedback = job.review.as_ref().map(|r| r.feedback.clone());
        Self {
            workflow_id: job.id,
            status: job.status,
            files: job.files,
            plan: job.plan,
            explanation: job.explanation,
            approved,
            review_feedback,
            error: job.error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub current_agent: Option<WorkerRole>,
    pub task: String,
}

impl From<WorkflowJob> for WorkflowSummary {
    fn from(job: WorkflowJob) -> Self {
        Self {
            workflow_id: job.id,
            status: job.status,
            current_agent: job.current_agent,
            task: job.task,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowListResponse {
    pub workflows: Vec<WorkflowSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Current workflow status, for `not_ready` answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_defaults_framework() {
        for body in [
            r#"{"task":"Create a todo app"}"#,
            r#"{"task":"Create a todo app","framework":null}"#,
            r#"{"task":"Create a todo app","framework":"  "}"#,
        ] {
            let req: StartWorkflowRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.framework_or_default(), "react", "{body}");
        }
        let req: StartWorkflowRequest =
            serde_json::from_str(r#"{"task":"t","framework":" vue "}"#).unwrap();
        assert_eq!(req.framework_or_default(), "vue");
    }

    #[test]
    fn status_response_omits_absent_error() {
        let job = WorkflowJob::new("t".into(), "vue".into(), 3);
        let json = serde_json::to_value(WorkflowStatusResponse::from(&job)).unwrap();
        assert_eq!(json["status"], "started");
        assert!(json["current_agent"].is_null());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn result_of_fresh_job_has_no_verdict() {
        let job = WorkflowJob::new("t".into(), "vue".into(), 3);
        let result = WorkflowResultResponse::from(job);
        assert_eq!(result.approved, None);
        assert!(result.review_feedback.is_none());
    }
}
