//! Consumer side of the workflow HTTP API.
//!
//! The one distinction that matters to callers is [`ClientError::Unavailable`]
//! (nothing answered) versus everything else (the service answered, and
//! said no).

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::debug;

use crate::api::{
    ErrorBody, HealthResponse, StartWorkflowRequest, StartWorkflowResponse,
    WorkflowListResponse, WorkflowResultResponse, WorkflowStatusResponse,
};
use crate::error::ClientError;
use crate::state_machine::WorkflowStatus;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    http: Client,
    base_url: String,
}

impl OrchestratorClient {
    /// `timeout` bounds every individual request, not a whole workflow.
    ///
    /// `base_url` must be an absolute `http` or `https` URL; anything else is
    /// [`ClientError::InvalidUrl`], never [`ClientError::Unavailable`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        validate_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Setup)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get("/health").await
    }

    pub async fn start_workflow(
        &self,
        task: &str,
        framework: &str,
    ) -> Result<StartWorkflowResponse, ClientError> {
        let body = StartWorkflowRequest {
            task: task.to_string(),
            framework: Some(framework.to_string()),
        };
        let url = self.url("/workflow/start");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;
        decode(&url, response).await
    }

    pub async fn get_status(&self, id: &str) -> Result<WorkflowStatusResponse, ClientError> {
        self.get(&format!("/workflow/{id}/status")).await
    }

    /// Fails with [`ClientError::NotReady`] while the workflow is running.
    pub async fn get_result(&self, id: &str) -> Result<WorkflowResultResponse, ClientError> {
        let url = self.url(&format!("/workflow/{id}/result"));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;

        if response.status() == reqwest::StatusCode::ACCEPTED {
            let body: ErrorBody = read_json(&url, response).await?;
            return Err(ClientError::NotReady {
                id: id.to_string(),
                status: body.status.unwrap_or(WorkflowStatus::Started),
            });
        }
        decode(&url, response).await
    }

    pub async fn list_workflows(&self) -> Result<WorkflowListResponse, ClientError> {
        self.get("/workflows").await
    }

    /// Polls status until the workflow is terminal or `max_wait` elapses.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<WorkflowStatusResponse, ClientError> {
        self.wait_for_completion_with(id, poll_interval, max_wait, |_| {})
            .await
    }

    /// Like [`wait_for_completion`](Self::wait_for_completion), calling
    /// `observer` with every status it sees.
    pub async fn wait_for_completion_with<F>(
        &self,
        id: &str,
        poll_interval: Duration,
        max_wait: Duration,
        mut observer: F,
    ) -> Result<WorkflowStatusResponse, ClientError>
    where
        F: FnMut(&WorkflowStatusResponse),
    {
        let started = Instant::now();
        let deadline = started + max_wait;
        loop {
            let status = self.get_status(id).await?;
            observer(&status);
            if status.status.is_terminal() {
                return Ok(status);
            }
            debug!(workflow_id = id, status = %status.status, "workflow still running");

            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::Timeout {
                    id: id.to_string(),
                    waited: now - started,
                });
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;
        decode(&url, response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ClientError> {
    let invalid = |reason: String| ClientError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };
    let url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

/// Transport failures mean nothing answered; a request that could not even
/// be built is a configuration problem.
fn unavailable(url: &str, err: reqwest::Error) -> ClientError {
    if err.is_builder() {
        return ClientError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        };
    }
    ClientError::Unavailable {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return read_json(url, response).await;
    }

    let text = response
        .text()
        .await
        .map_err(|e| unavailable(url, e))?;
    Err(match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::ServiceError {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        },
        Err(_) => ClientError::ServiceError {
            status: status.as_u16(),
            code: "http_error".to_string(),
            message: text,
        },
    })
}

async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ClientError> {
    let status = response.status().as_u16();
    let bytes = response.bytes().await.map_err(|e| unavailable(url, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::ServiceError {
        status,
        code: "invalid_response".to_string(),
        message: e.to_string(),
    })
}
