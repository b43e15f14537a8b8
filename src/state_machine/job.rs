use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::WorkflowStatus;
use crate::workers::{Review, WorkerRole};

/// File path to file content. Ordered so results serialize deterministically.
pub type FileMap = BTreeMap<String, String>;

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// One end-to-end run of the pipeline for a single task.
///
/// Created by the API on a start request, then owned exclusively by the
/// engine task driving it. Everything else sees snapshots from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub id: String,
    pub task: String,
    pub framework: String,
    /// Set exactly once, when the planner succeeds.
    pub plan: Vec<String>,
    /// Grows by key union; frozen once the job is terminal.
    pub files: FileMap,
    /// Completed revision cycles, `0..=max_iterations`.
    pub iteration: u32,
    pub max_iterations: u32,
    pub status: WorkflowStatus,
    pub current_agent: Option<WorkerRole>,
    /// Present only when `status == Failed`.
    pub error: Option<String>,
    pub explanation: Option<String>,
    /// Latest reviewer verdict.
    pub review: Option<Review>,
    pub status_history: Vec<WorkflowStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowJob {
    pub fn new(task: String, framework: String, max_iterations: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            task,
            framework,
            plan: Vec::new(),
            files: FileMap::new(),
            iteration: 0,
            max_iterations,
            status: WorkflowStatus::Started,
            current_agent: None,
            error: None,
            explanation: None,
            review: None,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a completed job was explicitly approved. `Some(false)` marks
    /// a soft success: the iteration cap was hit with open issues.
    pub fn approved(&self) -> Option<bool> {
        if self.status != WorkflowStatus::Completed {
            return None;
        }
        Some(self.review.as_ref().is_some_and(|r| r.approved))
    }

    /// Feedback of the latest review if it rejected the code.
    pub fn open_feedback(&self) -> Option<&str> {
        self.review
            .as_ref()
            .filter(|r| !r.approved)
            .map(|r| r.feedback.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(approved: bool) -> Review {
        Review {
            approved,
            score: Some(if approved { 9 } else { 4 }),
            feedback: if approved { "Good".into() } else { "Fix it".into() },
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn job_creation_defaults() {
        let job = WorkflowJob::new("Create a todo app".into(), "react".into(), 3);
        assert_eq!(job.status, WorkflowStatus::Started);
        assert_eq!(job.iteration, 0);
        assert_eq!(job.max_iterations, 3);
        assert!(job.plan.is_empty());
        assert!(job.files.is_empty());
        assert!(job.current_agent.is_none());
        assert!(job.status_history.is_empty());
        assert!(!job.is_terminal());
        assert_eq!(job.approved(), None);
    }

    #[test]
    fn ids_are_unique() {
        let a = WorkflowJob::new("t".into(), "react".into(), 3);
        let b = WorkflowJob::new("t".into(), "react".into(), 3);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn approval_flags_on_completed_jobs() {
        let mut job = WorkflowJob::new("t".into(), "react".into(), 3);
        job.status = WorkflowStatus::Completed;
        job.review = Some(review(true));
        assert_eq!(job.approved(), Some(true));
        assert_eq!(job.open_feedback(), None);

        job.review = Some(review(false));
        assert_eq!(job.approved(), Some(false));
        assert_eq!(job.open_feedback(), Some("Fix it"));
    }

    #[test]
    fn job_serializes_status_snake_case() {
        let mut job = WorkflowJob::new("t".into(), "react".into(), 3);
        job.status = WorkflowStatus::CodingRevision;
        job.current_agent = Some(WorkerRole::Coder);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "coding_revision");
        assert_eq!(json["current_agent"], "coder");
    }
}
