use thiserror::Error;

/// Why a Messages call produced no response.
///
/// Workers wrap every variant in `WorkerError::WorkerFailure`; nothing here
/// is retried.
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// HTTP 429. `retry_after_ms` comes from `retry-after`, 1000ms when absent.
    #[error("rate limited by model endpoint (retry after {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("model endpoint returned {status}: {message}")]
    ApiError { status: u16, message: String },

    /// 2xx answer whose body is not a Messages response.
    #[error("unreadable model response: {0}")]
    InvalidResponse(String),

    #[error("model endpoint unreachable: {0}")]
    NetworkError(#[from] reqwest::Error),
}
