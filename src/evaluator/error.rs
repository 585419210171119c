//! Transport errors for calls to the evaluation service.
//!
//! Every variant is treated as retryable by the invoker. `status_code`
//! exposes the HTTP status so callers can tell client errors apart when
//! they need to.

use thiserror::Error;

/// Failure of a single evaluator call.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The service answered with a non-2xx status.
    #[error("evaluator returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection, DNS or per-request timeout failure inside reqwest.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The body could not be decoded or carried no feedback.
    #[error("malformed evaluator response: {0}")]
    Malformed(String),

    /// The whole invocation, retries included, ran past its wall-clock bound.
    #[error("evaluator call exceeded {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl EvaluatorError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EvaluatorError::Status { status, .. } => Some(*status),
            EvaluatorError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
