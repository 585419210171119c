//! Automated grading of submission batches through an external evaluator.
//!
//! - [`invoker`] retries evaluator calls with a jittered, bounded policy.
//! - [`grade`] pulls a grade token out of free-text feedback.
//! - [`store`] persists per-submission state per assignment.
//! - [`orchestrator`] grades a roster sequentially and serves per-item retries.
//! - [`revision`] reworks one submission's feedback on reviewer request.

pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod grade;
pub mod invoker;
pub mod logging;
pub mod orchestrator;
pub mod revision;
pub mod roster;
pub mod state_machine;
pub mod store;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::GraderError;
pub use evaluator::{EvaluationRequest, Evaluator, EvaluatorClient, EvaluatorError};
pub use invoker::{ResilientInvoker, RetryPolicy};
pub use orchestrator::{GradingOrchestrator, ProgressEvent};
pub use revision::ReviewView;
pub use state_machine::{
    CancelHandle, GradingJob, JobReport, ProgressSummary, Roster, Submission, SubmissionState,
    SubmissionStatus,
};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};
