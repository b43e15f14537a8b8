//! HTTP facade over the engine and its job store.
//!
//! Handlers never wait on a workflow: start hands the job to the engine and
//! returns, everything else is a read of the store.

pub mod dto;
pub mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info};

use crate::anthropic::MessageSender;
use crate::engine::WorkflowEngine;

pub use dto::{
    DEFAULT_FRAMEWORK, ErrorBody, HealthResponse, ServiceInfo, StartWorkflowRequest,
    StartWorkflowResponse, WorkflowListResponse, WorkflowResultResponse, WorkflowStatusResponse,
    WorkflowSummary,
};
pub use error::ApiError;

type AppState<C> = Arc<WorkflowEngine<C>>;

pub fn router<C: MessageSender + 'static>(engine: Arc<WorkflowEngine<C>>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/workflow/start", post(start_workflow::<C>))
        .route("/workflow/{id}/status", get(workflow_status::<C>))
        .route("/workflow/{id}/result", get(workflow_result::<C>))
        .route("/workflows", get(list_workflows::<C>))
        .with_state(engine)
}

/// Binds `listen` and serves until ctrl-c.
///
/// If the ctrl-c handler cannot be installed the server keeps running.
pub async fn serve<C: MessageSender + 'static>(
    listen: SocketAddr,
    engine: Arc<WorkflowEngine<C>>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    let local = listener.local_addr().context("listener has no local address")?;
    info!(%local, "workflow service listening");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await
        .context("server terminated with error")
}

/// Resolves once `signal` fires; never resolves if it fails to install.
async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            error!(%err, "failed to listen for ctrl-c; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn start_workflow<C: MessageSender + 'static>(
    State(engine): State<AppState<C>>,
    payload: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartWorkflowResponse>), ApiError> {
    let Json(req) = payload?;
    let task = req.task.trim();
    if task.is_empty() {
        return Err(ApiError::InvalidArgument("task must not be blank".into()));
    }

    let job = engine
        .start(task.to_string(), req.framework_or_default().to_string())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StartWorkflowResponse {
            workflow_id: job.id,
            status: job.status,
        }),
    ))
}

async fn workflow_status<C: MessageSender + 'static>(
    State(engine): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowStatusResponse>, ApiError> {
    let job = engine
        .store()
        .get(&id)
        .await?
        .ok_or(ApiError::NotFound(id))?;
    Ok(Json(WorkflowStatusResponse::from(&job)))
}

async fn workflow_result<C: MessageSender + 'static>(
    State(engine): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResultResponse>, ApiError> {
    let job = engine
        .store()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(id.clone()))?;
    if !job.is_terminal() {
        return Err(ApiError::NotReady {
            id,
            status: job.status,
        });
    }
    Ok(Json(WorkflowResultResponse::from(job)))
}

async fn list_workflows<C: MessageSender + 'static>(
    State(engine): State<AppState<C>>,
) -> Result<Json<WorkflowListResponse>, ApiError> {
    let workflows: Vec<WorkflowSummary> = engine
        .store()
        .list()
        .await?
        .into_iter()
        .map(WorkflowSummary::from)
        .collect();
    Ok(Json(WorkflowListResponse {
        count: workflows.len(),
        workflows,
    }))
}
