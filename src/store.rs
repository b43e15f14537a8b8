//! Job registry.
//!
//! The engine is the only writer, one job per task; the API only reads.
//! Swap in a durable [`JobStore`] without touching the engine.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::state_machine::WorkflowJob;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<WorkflowJob>, StoreError>;

    /// Inserts or replaces the job with the same id.
    async fn put(&self, job: WorkflowJob) -> Result<(), StoreError>;

    /// All jobs, oldest first.
    async fn list(&self) -> Result<Vec<WorkflowJob>, StoreError>;
}

/// Process-local store. Jobs are never evicted; retention belongs to the caller.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, WorkflowJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: &str) -> Result<Option<WorkflowJob>, StoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(jobs.get(id).cloned())
    }

    async fn put(&self, job: WorkflowJob) -> Result<(), StoreError> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowJob>, StoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut all: Vec<WorkflowJob> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::WorkflowStatus;
    use chrono::Duration;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryJobStore::new();
        let job = WorkflowJob::new("Create a todo app".into(), "react".into(), 3);
        store.put(job.clone()).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.task, "Create a todo app");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_snapshot() {
        let store = InMemoryJobStore::new();
        let mut job = WorkflowJob::new("t".into(), "react".into(), 3);
        store.put(job.clone()).await.unwrap();

        job.status = WorkflowStatus::Planning;
        store.put(job.clone()).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, WorkflowStatus::Planning);
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation() {
        let store = InMemoryJobStore::new();
        let mut older = WorkflowJob::new("older".into(), "react".into(), 3);
        older.created_at -= Duration::seconds(10);
        let newer = WorkflowJob::new("newer".into(), "vue".into(), 3);

        store.put(newer).await.unwrap();
        store.put(older).await.unwrap();

        let tasks: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.task)
            .collect();
        assert_eq!(tasks, vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn concurrent_writers_on_distinct_jobs() {
        let store = std::sync::Arc::new(InMemoryJobStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let job = WorkflowJob::new(format!("task {i}"), "react".into(), 3);
                store.put(job).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 16);
    }
}
