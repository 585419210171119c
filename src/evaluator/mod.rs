pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_BASE_URL, Evaluator, EvaluatorClient};
pub use error::EvaluatorError;
pub use types::{EvaluationRequest, FeedbackResponse};
