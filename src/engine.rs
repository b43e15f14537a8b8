//! Drives workflow jobs through the state machine.
//!
//! Each job runs on its own spawned tokio task. The loop is always the
//! same: compute the event for the current state (calling workers where
//! the state needs one), hand it to [`StateMachine::next`], persist the
//! snapshot. The engine never returns an error to its caller; every
//! failure ends up in the job's `failed` status.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{Instrument, debug, error, info, warn};

use crate::anthropic::MessageSender;
use crate::error::{StoreError, WorkerError};
use crate::reducer;
use crate::state_machine::{
    DEFAULT_MAX_ITERATIONS, Event, StateMachine, Transition, WorkflowJob, WorkflowOutcome,
    WorkflowStatus,
};
use crate::store::JobStore;
use crate::workers::coder::{self, CodeOutput, CodeRequest, REVISION_SUBTASK};
use crate::workers::{Review, WorkerSettings, planner, reviewer};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Revision cycles allowed before completing with open issues.
    pub max_iterations: u32,
    /// Concurrent fan-out coders per job; 0 means one per subtask.
    pub max_parallel_coders: usize,
    pub worker: WorkerSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_parallel_coders: 0,
            worker: WorkerSettings::default(),
        }
    }
}

/// One independent fan-out unit: a plan entry and its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingUnit<'a> {
    pub index: usize,
    pub subtask: &'a str,
}

/// Exactly one unit per plan entry, in plan order.
pub fn assign(plan: &[String]) -> Vec<CodingUnit<'_>> {
    plan.iter()
        .enumerate()
        .map(|(index, subtask)| CodingUnit {
            index,
            subtask: subtask.as_str(),
        })
        .collect()
}

pub struct WorkflowEngine<C> {
    client: Arc<C>,
    store: Arc<dyn JobStore>,
    settings: EngineSettings,
}

impl<C: MessageSender + 'static> WorkflowEngine<C> {
    pub fn new(client: C, store: Arc<dyn JobStore>, settings: EngineSettings) -> Self {
        Self {
            client: Arc::new(client),
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Registers a new job and runs it in the background.
    ///
    /// Returns as soon as the job is stored; progress is only visible
    /// through the store.
    pub async fn start(
        self: &Arc<Self>,
        task: String,
        framework: String,
    ) -> Result<WorkflowJob, StoreError> {
        let job = WorkflowJob::new(task, framework, self.settings.max_iterations);
        self.store.put(job.clone()).await?;
        info!(workflow_id = %job.id, framework = %job.framework, "workflow started");

        let engine = Arc::clone(self);
        let span = tracing::info_span!("workflow", workflow_id = %job.id);
        let snapshot = job.clone();
        tokio::spawn(
            async move {
                engine.run(snapshot).await;
            }
            .instrument(span),
        );
        Ok(job)
    }

    /// Runs `job` to a terminal state on the current task.
    pub async fn run(&self, mut job: WorkflowJob) -> WorkflowJob {
        while let Some(event) = self.step(&job).await {
            let from = job.status;
            match StateMachine::next(&mut job, event) {
                Ok(transition) => log_transition(&job, from, &transition),
                Err(err) => {
                    error!(workflow_id = %job.id, %err, "state machine rejected event");
                    // Failed is accepted from every non-terminal state.
                    let _ = StateMachine::next(&mut job, Event::Failed(err.to_string()));
                }
            }
            self.persist(&job).await;
        }
        job
    }

    /// The event the current state produces, or `None` once terminal.
    async fn step(&self, job: &WorkflowJob) -> Option<Event> {
        let event = match job.status {
            WorkflowStatus::Started => Event::Begin,
            WorkflowStatus::Planning => {
                match planner::plan(
                    self.client.as_ref(),
                    &self.settings.worker,
                    &job.task,
                    &job.framework,
                )
                .await
                {
                    Ok(plan) => {
                        debug!(
                            workflow_id = %job.id,
                            subtasks = plan.subtasks.len(),
                            reasoning = plan.reasoning.as_deref().unwrap_or(""),
                            "plan ready"
                        );
                        Event::Planned(plan)
                    }
                    Err(err) => worker_failed(job, err),
                }
            }
            WorkflowStatus::Assigning => {
                info!(workflow_id = %job.id, coders = job.plan.len(), "dispatching coders");
                Event::Assigned
            }
            WorkflowStatus::Coding => self.fan_out(job).await,
            WorkflowStatus::Reviewing => {
                match reviewer::review(
                    self.client.as_ref(),
                    &self.settings.worker,
                    &job.files,
                    &job.framework,
                )
                .await
                {
                    Ok(review) => Event::Reviewed(review),
                    Err(err) => worker_failed(job, err),
                }
            }
            WorkflowStatus::Revising => Event::Revise,
            WorkflowStatus::CodingRevision => self.revise(job).await,
            WorkflowStatus::Completed | WorkflowStatus::Failed => return None,
        };
        Some(event)
    }

    /// Runs one coder per plan entry and joins them.
    ///
    /// All-or-nothing: the first failure drops the coders still running and
    /// discards the outputs of those that finished.
    async fn fan_out(&self, job: &WorkflowJob) -> Event {
        let units = assign(&job.plan);
        let limit = match self.settings.max_parallel_coders {
            0 => units.len().max(1),
            cap => cap,
        };

        let coders: Vec<_> = units.iter().map(|unit| self.code_unit(job, *unit)).collect();
        // `buffered` yields in input order, so outputs line up with subtask indices.
        let joined: Result<Vec<CodeOutput>, WorkerError> =
            stream::iter(coders).buffered(limit).try_collect().await;

        match joined {
            Ok(outputs) => Event::Coded(reducer::reduce(outputs)),
            Err(err) => worker_failed(job, err),
        }
    }

    async fn code_unit(
        &self,
        job: &WorkflowJob,
        unit: CodingUnit<'_>,
    ) -> Result<CodeOutput, WorkerError> {
        let req = CodeRequest::new(unit.subtask, &job.framework).with_task(&job.task);
        let output = coder::generate(self.client.as_ref(), &self.settings.worker, &req).await?;
        debug!(
            workflow_id = %job.id,
            subtask = unit.index,
            files = output.files.len(),
            "coder finished"
        );
        Ok(output)
    }

    /// Single coder with every accumulated file and the open feedback.
    async fn revise(&self, job: &WorkflowJob) -> Event {
        let notes = job.review.as_ref().map(revision_notes).unwrap_or_default();
        let req = CodeRequest::new(REVISION_SUBTASK, &job.framework)
            .with_task(&job.task)
            .with_existing_files(&job.files)
            .with_feedback(&notes);

        match coder::generate(self.client.as_ref(), &self.settings.worker, &req).await {
            Ok(output) => Event::Coded(output),
            Err(err) => worker_failed(job, err),
        }
    }

    async fn persist(&self, job: &WorkflowJob) {
        if let Err(err) = self.store.put(job.clone()).await {
            error!(workflow_id = %job.id, %err, "failed to persist workflow snapshot");
        }
    }
}

/// Reviewer feedback followed by its issues and suggestions as bullet lists.
fn revision_notes(review: &Review) -> String {
    let mut notes = review.feedback.clone();
    for (title, items) in [("Issues", &review.issues), ("Suggestions", &review.suggestions)] {
        if !items.is_empty() {
            notes.push_str(&format!("\n{title}:"));
            for item in items {
                notes.push_str(&format!("\n- {item}"));
            }
        }
    }
    notes
}

fn worker_failed(job: &WorkflowJob, err: WorkerError) -> Event {
    warn!(
        workflow_id = %job.id,
        status = %job.status,
        worker = %err.worker(),
        %err,
        "worker failed"
    );
    Event::Failed(err.to_string())
}

fn log_transition(job: &WorkflowJob, from: WorkflowStatus, transition: &Transition) {
    match transition {
        Transition::Next(to) => info!(
            workflow_id = %job.id,
            %from,
            %to,
            iteration = job.iteration,
            "transition"
        ),
        Transition::Complete(WorkflowOutcome::Approved) => info!(
            workflow_id = %job.id,
            iteration = job.iteration,
            files = job.files.len(),
            "workflow approved"
        ),
        Transition::Complete(WorkflowOutcome::BestEffort) => warn!(
            workflow_id = %job.id,
            iteration = job.iteration,
            files = job.files.len(),
            "iteration cap reached; completing with open issues"
        ),
        Transition::Complete(WorkflowOutcome::Failed(error)) => warn!(
            workflow_id = %job.id,
            %from,
            %error,
            "workflow failed"
        ),
    }
}
