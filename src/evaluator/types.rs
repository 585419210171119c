//! Wire types for the evaluation service.
//!
//! The service exposes two endpoints: `prompt_initial` grades a document
//! against instructor criteria, `prompt_redo` rewrites earlier feedback using
//! a reviewer note. Both answer with a single free-text `feedback` field.

use serde::{Deserialize, Serialize};

/// One call to the evaluator, either a first grading pass or a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationRequest {
    /// Grade a submission document against the assignment criteria.
    Initial { document: String, criteria: String },
    /// Rework existing feedback following the reviewer's note.
    Revision {
        reviewer_note: String,
        prior_feedback: String,
    },
}

impl EvaluationRequest {
    /// Endpoint path relative to the evaluator base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            EvaluationRequest::Initial { .. } => "/api/prompt_initial",
            EvaluationRequest::Revision { .. } => "/api/prompt_redo",
        }
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationRequest::Initial { .. } => "initial",
            EvaluationRequest::Revision { .. } => "revision",
        }
    }
}

/// Body sent to `/api/prompt_initial`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialPayload<'a> {
    /// Opaque locator of the submission artifact.
    pub document: &'a str,
    /// Instructor-supplied grading instructions.
    pub criteria: &'a str,
}

/// Body sent to `/api/prompt_redo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionPayload<'a> {
    pub reviewer_note: &'a str,
    pub prior_feedback: &'a str,
}

/// Response returned by both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    /// Evaluator output, usually markdown with a trailing grade line.
    pub feedback: String,
}
