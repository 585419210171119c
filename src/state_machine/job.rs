use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{SubmissionState, SubmissionStatus};
use crate::error::GraderError;

/// One student's artifact for one assignment. Immutable once a job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// 0-based position in the roster.
    pub index: usize,
    pub student_name: String,
    /// Opaque locator handed to the evaluator as-is.
    pub document: String,
}

/// Ordered submissions of one grading job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    submissions: Vec<Submission>,
}

impl Roster {
    /// Builds a roster from `(student_name, document)` pairs, numbering them
    /// by position.
    pub fn new<I, N, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        let submissions = entries
            .into_iter()
            .enumerate()
            .map(|(index, (name, document))| Submission {
                index,
                student_name: name.into(),
                document: document.into(),
            })
            .collect();
        Self { submissions }
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Submission> {
        self.submissions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.iter()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.submissions.iter().map(|s| s.index).collect()
    }
}

/// Instructor instructions for a job, guaranteed non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingCriteria(String);

impl GradingCriteria {
    pub fn parse(text: &str) -> Result<Self, GraderError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GraderError::Validation(
                "grading criteria must not be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cooperative cancellation flag shared between a running job and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One pass over a roster for one assignment. Not persisted; its effect is
/// the set of stored submission states.
#[derive(Debug, Clone)]
pub struct GradingJob {
    pub assignment_id: String,
    pub criteria: String,
    pub roster: Roster,
    cancel: CancelHandle,
}

impl GradingJob {
    pub fn new(
        assignment_id: impl Into<String>,
        criteria: impl Into<String>,
        roster: Roster,
    ) -> Self {
        Self {
            assignment_id: assignment_id.into(),
            criteria: criteria.into(),
            roster,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle the caller keeps to stop the run between submissions.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Summary of one finished (or cancelled) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub run_id: Uuid,
    pub assignment_id: String,
    pub total: usize,
    pub completed: usize,
    /// Completed submissions whose feedback carried a grade.
    pub graded: usize,
    pub errored: usize,
    /// Submissions never started because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    pub(crate) fn start(assignment_id: &str, total: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            assignment_id: assignment_id.to_string(),
            total,
            completed: 0,
            graded: 0,
            errored: 0,
            skipped: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.duration_ms = (self.finished_at - self.started_at).num_milliseconds();
        self
    }

    pub fn ungraded(&self) -> usize {
        self.completed - self.graded
    }
}

/// Per-status counts derived from stored states alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub idle: usize,
    pub processing: usize,
    pub completed: usize,
    pub errored: usize,
    pub graded: usize,
}

impl ProgressSummary {
    pub fn from_states(states: &BTreeMap<usize, SubmissionState>) -> Self {
        let mut summary = Self::default();
        for state in states.values() {
            match state.status {
                SubmissionStatus::Idle => summary.idle += 1,
                SubmissionStatus::Processing => summary.processing += 1,
                SubmissionStatus::Completed => summary.completed += 1,
                SubmissionStatus::Error => summary.errored += 1,
            }
            if state.grade.is_some() {
                summary.graded += 1;
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.idle + self.processing + self.completed + self.errored
    }

    /// A job is finished when every submission has a terminal status.
    pub fn is_finished(&self) -> bool {
        self.total() > 0 && self.idle == 0 && self.processing == 0
    }
}
