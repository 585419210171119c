use thiserror::Error;

use crate::evaluator::EvaluatorError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GraderError {
    /// Missing or blank caller input; nothing was sent or stored.
    #[error("validation error: {0}")]
    Validation(String),

    /// The target record is not in a state the operation can act on.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Evaluator call failed after every retry.
    #[error("evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    /// A state write failed; the operation stopped at this step.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GraderError {
    /// Transient evaluator failures are the only ones a caller can fix by
    /// simply trying again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, GraderError::Evaluator(_))
    }
}
