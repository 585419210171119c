//! Sequential grading of a roster.
//!
//! [`GradingOrchestrator::run`] walks the roster strictly in order with one
//! evaluator call in flight at a time, writing through the store after every
//! state change. A failed submission is recorded as `Error` and the run moves
//! on; a failed store write stops the run at that submission.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::error::GraderError;
use crate::evaluator::{EvaluationRequest, Evaluator};
use crate::grade::extract_grade;
use crate::invoker::ResilientInvoker;
use crate::state_machine::{
    GradingCriteria, GradingJob, JobReport, ProgressSummary, Roster, Submission, SubmissionState,
    SubmissionStatus,
};
use crate::store::{AssignmentStates, StateStore};

/// Push-side progress notifications for observers such as a terminal UI.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    JobStarted {
        assignment_id: String,
        total: usize,
    },
    SubmissionStarted {
        index: usize,
        student_name: String,
    },
    SubmissionCompleted {
        index: usize,
        grade: Option<String>,
    },
    SubmissionFailed {
        index: usize,
        error: String,
    },
    JobCancelled {
        skipped: usize,
    },
    JobFinished(Box<JobReport>),
}

/// Per-assignment mutual exclusion for runs, retries and revisions.
#[derive(Debug, Default)]
pub(crate) struct AssignmentLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AssignmentLocks {
    pub(crate) async fn acquire(&self, assignment_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inner = self.inner.lock();
            inner.entry(assignment_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

enum SubmissionOutcome {
    Completed { graded: bool },
    Failed,
}

/// Drives grading jobs and the per-item operations around them.
pub struct GradingOrchestrator<E, S> {
    pub(crate) invoker: ResilientInvoker<E>,
    pub(crate) store: Arc<S>,
    pub(crate) locks: AssignmentLocks,
    events: Option<UnboundedSender<ProgressEvent>>,
}

impl<E: Evaluator, S: StateStore> GradingOrchestrator<E, S> {
    pub fn new(invoker: ResilientInvoker<E>, store: Arc<S>) -> Self {
        Self {
            invoker,
            store,
            locks: AssignmentLocks::default(),
            events: None,
        }
    }

    /// Send [`ProgressEvent`]s to `sender`. A closed receiver is ignored.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-open an assignment: create `idle` records for submissions without
    /// one and return what is stored. Existing progress is never reset.
    pub fn open(&self, assignment_id: &str, roster: &Roster) -> Result<AssignmentStates, GraderError> {
        validate_assignment_id(assignment_id)?;
        Ok(self.store.ensure(assignment_id, &roster.indices())?)
    }

    /// Current records of an assignment, for polling observers.
    pub fn states(&self, assignment_id: &str) -> Result<AssignmentStates, GraderError> {
        validate_assignment_id(assignment_id)?;
        Ok(self.store.get_all(assignment_id)?)
    }

    pub fn progress(&self, assignment_id: &str) -> Result<ProgressSummary, GraderError> {
        Ok(ProgressSummary::from_states(&self.states(assignment_id)?))
    }

    /// Remove every record of an assignment.
    pub async fn clear(&self, assignment_id: &str) -> Result<(), GraderError> {
        validate_assignment_id(assignment_id)?;
        let _guard = self.locks.acquire(assignment_id).await;
        self.store.clear(assignment_id)?;
        info!(assignment = assignment_id, "results cleared");
        Ok(())
    }

    /// Grade every submission of `job` in roster order.
    ///
    /// Starting a run discards the previous run's results and marks the whole
    /// roster `Processing` in one write. Cancellation is checked before each
    /// submission; submissions not yet started go back to `Idle`.
    pub async fn run(&self, job: &GradingJob) -> Result<JobReport, GraderError> {
        let criteria = GradingCriteria::parse(&job.criteria)?;
        let assignment_id = job.assignment_id.as_str();
        validate_assignment_id(assignment_id)?;

        let _guard = self.locks.acquire(assignment_id).await;
        let mut report = JobReport::start(assignment_id, job.roster.len());
        info!(
            assignment = assignment_id,
            run_id = %report.run_id,
            total = report.total,
            "grading job started"
        );

        let indices = job.roster.indices();
        self.store.update(assignment_id, |states| {
            states.clear();
            for &index in &indices {
                let mut state = SubmissionState::idle();
                state.mark(SubmissionStatus::Processing);
                states.insert(index, state);
            }
            Ok(())
        })?;
        self.emit(ProgressEvent::JobStarted {
            assignment_id: assignment_id.to_string(),
            total: report.total,
        });

        for (position, submission) in job.roster.iter().enumerate() {
            if job.is_cancelled() {
                let remaining: Vec<usize> =
                    job.roster.iter().skip(position).map(|s| s.index).collect();
                self.store
                    .set_statuses(assignment_id, &remaining, SubmissionStatus::Idle)?;
                report.cancelled = true;
                report.skipped = remaining.len();
                warn!(
                    assignment = assignment_id,
                    skipped = report.skipped,
                    "grading job cancelled"
                );
                self.emit(ProgressEvent::JobCancelled {
                    skipped: report.skipped,
                });
                break;
            }

            match self.grade_submission(assignment_id, &criteria, submission).await? {
                SubmissionOutcome::Completed { graded } => {
                    report.completed += 1;
                    if graded {
                        report.graded += 1;
                    }
                }
                SubmissionOutcome::Failed => report.errored += 1,
            }
        }

        let report = report.finish();
        info!(
            assignment = assignment_id,
            run_id = %report.run_id,
            completed = report.completed,
            errored = report.errored,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "grading job finished"
        );
        self.emit(ProgressEvent::JobFinished(Box::new(report.clone())));
        Ok(report)
    }

    /// Grade one submission again after an error or an interrupted run.
    ///
    /// `Completed` records are rejected. A `Processing` record is accepted:
    /// holding the assignment lock means no run is in flight, so it was left
    /// behind by an aborted or crashed run. Other submissions are never
    /// touched.
    pub async fn retry_submission(
        &self,
        assignment_id: &str,
        criteria: &str,
        submission: &Submission,
    ) -> Result<SubmissionState, GraderError> {
        let criteria = GradingCriteria::parse(criteria)?;
        validate_assignment_id(assignment_id)?;

        let _guard = self.locks.acquire(assignment_id).await;
        let status = self
            .store
            .get_all(assignment_id)?
            .get(&submission.index)
            .map(|s| s.status)
            .ok_or_else(|| {
                GraderError::Precondition(format!(
                    "submission {} of assignment {assignment_id} has no record",
                    submission.index
                ))
            })?;
        if status == SubmissionStatus::Completed {
            return Err(GraderError::Precondition(format!(
                "submission {} is already COMPLETED; revise it or re-run the job",
                submission.index
            )));
        }

        self.store
            .set_status(assignment_id, submission.index, SubmissionStatus::Processing)?;
        self.grade_submission(assignment_id, &criteria, submission)
            .await?;

        self.store
            .get_all(assignment_id)?
            .remove(&submission.index)
            .ok_or_else(|| {
                GraderError::Precondition(format!(
                    "submission {} vanished during retry",
                    submission.index
                ))
            })
    }

    /// Call the evaluator for one submission and persist the outcome.
    /// Only a store failure is returned as an error.
    async fn grade_submission(
        &self,
        assignment_id: &str,
        criteria: &GradingCriteria,
        submission: &Submission,
    ) -> Result<SubmissionOutcome, GraderError> {
        self.emit(ProgressEvent::SubmissionStarted {
            index: submission.index,
            student_name: submission.student_name.clone(),
        });

        let request = EvaluationRequest::Initial {
            document: submission.document.clone(),
            criteria: criteria.as_str().to_string(),
        };
        match self.invoker.invoke(&request).await {
            Ok(feedback) => {
                let grade = extract_grade(&feedback);
                self.store
                    .set_result(assignment_id, submission.index, &feedback, grade.as_deref())?;
                if grade.is_none() {
                    warn!(
                        assignment = assignment_id,
                        index = submission.index,
                        "no grade line found in feedback"
                    );
                }
                info!(
                    assignment = assignment_id,
                    index = submission.index,
                    student = %submission.student_name,
                    grade = grade.as_deref().unwrap_or("-"),
                    "submission graded"
                );
                let graded = grade.is_some();
                self.emit(ProgressEvent::SubmissionCompleted {
                    index: submission.index,
                    grade,
                });
                Ok(SubmissionOutcome::Completed { graded })
            }
            Err(err) => {
                self.store
                    .set_status(assignment_id, submission.index, SubmissionStatus::Error)?;
                error!(
                    assignment = assignment_id,
                    index = submission.index,
                    student = %submission.student_name,
                    error = %err,
                    "submission failed"
                );
                self.emit(ProgressEvent::SubmissionFailed {
                    index: submission.index,
                    error: err.to_string(),
                });
                Ok(SubmissionOutcome::Failed)
            }
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}

pub(crate) fn validate_assignment_id(assignment_id: &str) -> Result<(), GraderError> {
    if assignment_id.trim().is_empty() {
        return Err(GraderError::Validation(
            "assignment id must not be empty".into(),
        ));
    }
    Ok(())
}
