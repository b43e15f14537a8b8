//! Scripted `MessageSender` doubles shared by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::anthropic::{AnthropicError, MessageSender, MessagesRequest, MessagesResponse};
use crate::error::StoreError;
use crate::state_machine::{FileMap, WorkflowJob, WorkflowStatus};
use crate::store::{InMemoryJobStore, JobStore};
use crate::workers::WorkerRole;
use crate::workers::coder::REVISION_SUBTASK;

/// Answers every request with the same text and remembers the last request.
pub(crate) struct FixedModel {
    text: String,
    last: Mutex<Option<MessagesRequest>>,
}

impl FixedModel {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            last: Mutex::new(None),
        }
    }

    pub(crate) fn last_request(&self) -> Option<MessagesRequest> {
        self.last.lock().unwrap().clone()
    }
}

impl MessageSender for FixedModel {
    async fn send_message(
        &self,
        req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        *self.last.lock().unwrap() = Some(req.clone());
        Ok(MessagesResponse::from_text("fixed", self.text.clone()))
    }
}

/// Fails every call as if the endpoint returned HTTP 500.
pub(crate) struct FailingModel;

impl MessageSender for FailingModel {
    async fn send_message(
        &self,
        _req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        Err(AnthropicError::ApiError {
            status: 500,
            message: "mock error".into(),
        })
    }
}

/// Plays all three worker roles from a script.
///
/// - planner: returns `plan` (or `planner_text` verbatim)
/// - coder: files registered for the subtask, else one file named after it;
///   `REVISION_SUBTASK` returns `revision_files`
/// - reviewer: pops the next verdict, approving once the script runs out
pub(crate) struct ScriptedModel {
    plan: Vec<String>,
    planner_text: Option<String>,
    files_by_subtask: HashMap<String, FileMap>,
    revision_files: FileMap,
    failing_subtasks: HashSet<String>,
    verdicts: Mutex<VecDeque<bool>>,
    barrier: Option<Arc<Barrier>>,
    delays_ms: HashMap<String, u64>,
    coder_requests: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    reviewer_inputs: Mutex<Vec<String>>,
    planner_calls: AtomicUsize,
    coder_calls: AtomicUsize,
    reviewer_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub(crate) fn new(plan: &[&str]) -> Self {
        let mut revision_files = FileMap::new();
        revision_files.insert("/App.jsx".into(), "revised".into());
        Self {
            plan: plan.iter().map(|s| s.to_string()).collect(),
            planner_text: None,
            files_by_subtask: HashMap::new(),
            revision_files,
            failing_subtasks: HashSet::new(),
            verdicts: Mutex::new(VecDeque::new()),
            barrier: None,
            delays_ms: HashMap::new(),
            coder_requests: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            reviewer_inputs: Mutex::new(Vec::new()),
            planner_calls: AtomicUsize::new(0),
            coder_calls: AtomicUsize::new(0),
            reviewer_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_files(mut self, subtask: &str, files: &[(&str, &str)]) -> Self {
        self.files_by_subtask.insert(
            subtask.to_string(),
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
        self
    }

    pub(crate) fn with_planner_text(mut self, text: &str) -> Self {
        self.planner_text = Some(text.to_string());
        self
    }

    pub(crate) fn with_verdicts(self, verdicts: &[bool]) -> Self {
        *self.verdicts.lock().unwrap() = verdicts.iter().copied().collect();
        self
    }

    pub(crate) fn failing_on(mut self, subtask: &str) -> Self {
        self.failing_subtasks.insert(subtask.to_string());
        self
    }

    /// Every fan-out coder waits on a barrier of `parties`; only completes
    /// if that many coders run at the same time.
    pub(crate) fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    /// Fan-out coder for `subtask` takes `ms` instead of the default 10ms.
    pub(crate) fn with_delay(mut self, subtask: &str, ms: u64) -> Self {
        self.delays_ms.insert(subtask.to_string(), ms);
        self
    }

    pub(crate) fn planner_calls(&self) -> usize {
        self.planner_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn coder_calls(&self) -> usize {
        self.coder_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reviewer_calls(&self) -> usize {
        self.reviewer_calls.load(Ordering::SeqCst)
    }

    /// Most fan-out coders observed running at once.
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn coder_requests(&self) -> Vec<String> {
        self.coder_requests.lock().unwrap().clone()
    }

    pub(crate) fn reviewer_inputs(&self) -> Vec<String> {
        self.reviewer_inputs.lock().unwrap().clone()
    }

    /// Fan-out subtasks in the order their coders returned.
    pub(crate) fn finish_order(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    fn planner_reply(&self) -> String {
        self.planner_text.clone().unwrap_or_else(|| {
            serde_json::json!({
                "subtasks": self.plan,
                "reasoning": "scripted plan",
            })
            .to_string()
        })
    }

    async fn coder_reply(&self, req: &MessagesRequest) -> Result<String, AnthropicError> {
        let user = req.user_text().to_string();
        self.coder_requests.lock().unwrap().push(user.clone());
        let subtask = subtask_of(&user);

        if subtask != REVISION_SUBTASK {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            let ms = self.delays_ms.get(&subtask).copied().unwrap_or(10);
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(subtask.clone());
        }
        if self.failing_subtasks.contains(&subtask) {
            return Err(AnthropicError::ApiError {
                status: 500,
                message: format!("coder crashed on {subtask}"),
            });
        }

        let files = if subtask == REVISION_SUBTASK {
            self.revision_files.clone()
        } else {
            self.files_by_subtask
                .get(&subtask)
                .cloned()
                .unwrap_or_else(|| {
                    let mut files = FileMap::new();
                    files.insert(format!("/{}.js", subtask.replace(' ', "_")), subtask.clone());
                    files
                })
        };
        Ok(serde_json::json!({
            "files": files,
            "explanation": format!("code for {subtask}"),
        })
        .to_string())
    }

    fn reviewer_reply(&self, req: &MessagesRequest) -> String {
        self.reviewer_inputs
            .lock()
            .unwrap()
            .push(req.user_text().to_string());
        let approved = self.verdicts.lock().unwrap().pop_front().unwrap_or(true);
        let verdict = if approved {
            serde_json::json!({"approved": true, "score": 9, "feedback": "Looks good"})
        } else {
            serde_json::json!({
                "approved": false,
                "score": 4,
                "feedback": "Needs work",
                "issues": ["missing export"],
            })
        };
        verdict.to_string()
    }
}

impl MessageSender for ScriptedModel {
    async fn send_message(
        &self,
        req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        let text = match WorkerRole::of(req) {
            Some(WorkerRole::Planner) => {
                self.planner_calls.fetch_add(1, Ordering::SeqCst);
                self.planner_reply()
            }
            Some(WorkerRole::Coder) => {
                self.coder_calls.fetch_add(1, Ordering::SeqCst);
                self.coder_reply(req).await?
            }
            Some(WorkerRole::Reviewer) => {
                self.reviewer_calls.fetch_add(1, Ordering::SeqCst);
                self.reviewer_reply(req)
            }
            None => {
                return Err(AnthropicError::ApiError {
                    status: 400,
                    message: "request without a worker preamble".into(),
                });
            }
        };
        Ok(MessagesResponse::from_text("scripted", text))
    }
}

/// In-memory store that also keeps every snapshot it was handed.
#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: InMemoryJobStore,
    puts: Mutex<Vec<WorkflowJob>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn snapshots(&self) -> Vec<WorkflowJob> {
        self.puts.lock().unwrap().clone()
    }

    pub(crate) fn statuses(&self) -> Vec<WorkflowStatus> {
        self.puts.lock().unwrap().iter().map(|j| j.status).collect()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn get(&self, id: &str) -> Result<Option<WorkflowJob>, StoreError> {
        self.inner.get(id).await
    }

    async fn put(&self, job: WorkflowJob) -> Result<(), StoreError> {
        self.puts.lock().unwrap().push(job.clone());
        self.inner.put(job).await
    }

    async fn list(&self) -> Result<Vec<WorkflowJob>, StoreError> {
        self.inner.list().await
    }
}

fn subtask_of(user: &str) -> String {
    user.lines()
        .find_map(|line| line.strip_prefix("Subtask: "))
        .unwrap_or_default()
        .to_string()
}
