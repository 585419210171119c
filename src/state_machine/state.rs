use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-submission status.
///
/// A job run moves every submission through: IDLE → PROCESSING → COMPLETED | ERROR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Idle => write!(f, "IDLE"),
            SubmissionStatus::Processing => write!(f, "PROCESSING"),
            SubmissionStatus::Completed => write!(f, "COMPLETED"),
            SubmissionStatus::Error => write!(f, "ERROR"),
        }
    }
}

impl SubmissionStatus {
    /// `Completed` and `Error` only change through an explicit new action.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Completed | SubmissionStatus::Error)
    }

    /// Whether the orchestrator or the revision workflow may move a
    /// submission from `self` to `next`.
    ///
    /// - `Processing` may fall back to `Idle` when a run is cancelled before
    ///   the submission was started.
    /// - `Completed → Completed` is a revision.
    /// - Terminal states only leave through a re-run or per-item retry.
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Idle, Processing)
                | (Processing, Completed)
                | (Processing, Error)
                | (Processing, Idle)
                | (Completed, Processing)
                | (Completed, Completed)
                | (Error, Processing)
        )
    }
}

/// Stored record for one `(assignment, submission index)` pair.
///
/// `feedback` is present exactly when the status is `Completed`, and a grade
/// is only ever present alongside feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionState {
    pub status: SubmissionStatus,
    pub feedback: Option<String>,
    pub grade: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionState {
    pub fn idle() -> Self {
        Self {
            status: SubmissionStatus::Idle,
            feedback: None,
            grade: None,
            updated_at: Utc::now(),
        }
    }

    /// Set a status that carries no result; clears feedback and grade.
    pub(crate) fn mark(&mut self, status: SubmissionStatus) {
        self.status = status;
        self.feedback = None;
        self.grade = None;
        self.updated_at = Utc::now();
    }

    /// Record evaluator output; always leaves the record `Completed`.
    pub(crate) fn complete(&mut self, feedback: String, grade: Option<String>) {
        self.status = SubmissionStatus::Completed;
        self.feedback = Some(feedback);
        self.grade = grade;
        self.updated_at = Utc::now();
    }

    /// Checks the feedback/grade/status invariants.
    pub fn is_consistent(&self) -> bool {
        let grade_ok = self.grade.is_none() || self.feedback.is_some();
        let status_ok = match self.status {
            SubmissionStatus::Completed => self.feedback.is_some(),
            _ => self.feedback.is_none(),
        };
        grade_ok && status_ok
    }
}
