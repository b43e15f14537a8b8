use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::job::WorkflowJob;
use crate::error::TransitionError;
use crate::reducer;
use crate::workers::{CodeOutput, Plan, Review, WorkerRole};

/// Lifecycle states of a workflow job.
///
/// ```text
/// started → planning → assigning → coding → reviewing → completed
///                                              ↑   ↓
///                           coding_revision ← revising
/// ```
/// Any non-terminal state can move to `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Started,
    Planning,
    Assigning,
    Coding,
    Reviewing,
    Revising,
    CodingRevision,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Started => "started",
            WorkflowStatus::Planning => "planning",
            WorkflowStatus::Assigning => "assigning",
            WorkflowStatus::Coding => "coding",
            WorkflowStatus::Reviewing => "reviewing",
            WorkflowStatus::Revising => "revising",
            WorkflowStatus::CodingRevision => "coding_revision",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// The worker that runs while the job sits in this state, if any.
    pub fn agent(self) -> Option<WorkerRole> {
        match self {
            WorkflowStatus::Planning => Some(WorkerRole::Planner),
            WorkflowStatus::Coding | WorkflowStatus::CodingRevision => Some(WorkerRole::Coder),
            WorkflowStatus::Reviewing => Some(WorkerRole::Reviewer),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to a job, fed into [`StateMachine::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Begin,
    Planned(Plan),
    Assigned,
    /// Merged output of a coding phase (fan-out batch or revision).
    Coded(CodeOutput),
    Reviewed(Review),
    Revise,
    Failed(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Begin => "begin",
            Event::Planned(_) => "planned",
            Event::Assigned => "assigned",
            Event::Coded(_) => "coded",
            Event::Reviewed(_) => "reviewed",
            Event::Revise => "revise",
            Event::Failed(_) => "failed",
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Approved,
    /// Iteration cap reached without approval. Still `completed`.
    BestEffort,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(WorkflowStatus),
    Complete(WorkflowOutcome),
}

/// Pure transition function over [`WorkflowJob`]; no I/O, no scheduler.
pub struct StateMachine;

impl StateMachine {
    /// Applies `event` to `job` and returns the resulting transition.
    ///
    /// Rejected events (wrong state, or a terminal job) leave the job as is.
    pub fn next(job: &mut WorkflowJob, event: Event) -> Result<Transition, TransitionError> {
        let state = job.status;
        if state.is_terminal() {
            return Err(TransitionError::Terminal(state));
        }

        let transition = match (state, event) {
            (_, Event::Failed(error)) => {
                job.error = Some(error.clone());
                Transition::Complete(WorkflowOutcome::Failed(error))
            }
            (WorkflowStatus::Started, Event::Begin) => Transition::Next(WorkflowStatus::Planning),
            (WorkflowStatus::Planning, Event::Planned(plan)) => {
                if plan.subtasks.is_empty() {
                    let error = "planner returned an empty plan".to_string();
                    job.error = Some(error.clone());
                    Transition::Complete(WorkflowOutcome::Failed(error))
                } else {
                    job.plan = plan.subtasks;
                    Transition::Next(WorkflowStatus::Assigning)
                }
            }
            (WorkflowStatus::Assigning, Event::Assigned) => {
                Transition::Next(WorkflowStatus::Coding)
            }
            (WorkflowStatus::Coding, Event::Coded(output)) => {
                Self::absorb(job, output);
                Transition::Next(WorkflowStatus::Reviewing)
            }
            (WorkflowStatus::CodingRevision, Event::Coded(output)) => {
                Self::absorb(job, output);
                job.iteration += 1;
                Transition::Next(WorkflowStatus::Reviewing)
            }
            (WorkflowStatus::Reviewing, Event::Reviewed(review)) => {
                let approved = review.approved;
                job.review = Some(review);
                if approved {
                    Transition::Complete(WorkflowOutcome::Approved)
                } else if job.iteration >= job.max_iterations {
                    Transition::Complete(WorkflowOutcome::BestEffort)
                } else {
                    Transition::Next(WorkflowStatus::Revising)
                }
            }
            (WorkflowStatus::Revising, Event::Revise) => {
                Transition::Next(WorkflowStatus::CodingRevision)
            }
            (state, event) => {
                return Err(TransitionError::InvalidEvent {
                    state,
                    event: event.name(),
                });
            }
        };

        let next = match &transition {
            Transition::Next(next) => *next,
            Transition::Complete(WorkflowOutcome::Failed(_)) => WorkflowStatus::Failed,
            Transition::Complete(_) => WorkflowStatus::Completed,
        };
        job.status_history.push(job.status);
        job.status = next;
        if let Some(agent) = next.agent() {
            job.current_agent = Some(agent);
        }
        job.updated_at = Utc::now();

        Ok(transition)
    }

    fn absorb(job: &mut WorkflowJob, output: CodeOutput) {
        reducer::merge_into(&mut job.files, output.files);
        if output.explanation.is_some() {
            job.explanation = output.explanation;
        }
    }
}
