use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::dto::ErrorBody;
use crate::error::StoreError;
use crate::state_machine::WorkflowStatus;

/// Every failure a handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("workflow {0} not found")]
    NotFound(String),

    #[error("workflow {id} is still {status}")]
    NotReady { id: String, status: WorkflowStatus },

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Malformed bodies answer with the same `ErrorBody` as every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::NotReady { .. } => "not_ready",
            ApiError::InvalidArgument(_) => "invalid_argument",
            ApiError::Store(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotReady { .. } => StatusCode::ACCEPTED,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(err) = &self {
            tracing::error!(%err, "job store failure");
        }
        let status = match &self {
            ApiError::NotReady { status, .. } => Some(*status),
            _ => None,
        };
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            status,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
