//! Reviewer-requested second pass over one submission's feedback.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::GraderError;
use crate::evaluator::{EvaluationRequest, Evaluator};
use crate::grade::{extract_grade, strip_grade_line};
use crate::orchestrator::{GradingOrchestrator, validate_assignment_id};
use crate::state_machine::{SubmissionState, SubmissionStatus};
use crate::store::StateStore;

/// What a reviewer sees for one submission: the feedback body without its
/// grade line, and the grade as a separate field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub index: usize,
    pub status: SubmissionStatus,
    pub feedback: Option<String>,
    pub grade: Option<String>,
}

impl<E: Evaluator, S: StateStore> GradingOrchestrator<E, S> {
    /// Ask the evaluator to rework a submission's feedback following
    /// `reviewer_note`, then re-derive the grade.
    ///
    /// The revised feedback and grade replace the old ones; a revision may
    /// add, change or drop the grade. When the evaluator keeps failing the
    /// stored record is left as it was and the error is returned.
    pub async fn revise(
        &self,
        assignment_id: &str,
        index: usize,
        reviewer_note: &str,
    ) -> Result<SubmissionState, GraderError> {
        validate_assignment_id(assignment_id)?;
        let note = reviewer_note.trim();
        if note.is_empty() {
            return Err(GraderError::Validation(
                "reviewer note must not be empty".into(),
            ));
        }

        let _guard = self.locks.acquire(assignment_id).await;
        let prior_feedback = self
            .store
            .get_all(assignment_id)?
            .remove(&index)
            .and_then(|state| state.feedback)
            .ok_or_else(|| {
                GraderError::Precondition(format!(
                    "submission {index} of assignment {assignment_id} has no feedback to revise"
                ))
            })?;

        let request = EvaluationRequest::Revision {
            reviewer_note: note.to_string(),
            prior_feedback,
        };
        let revised = match self.invoker.invoke(&request).await {
            Ok(feedback) => feedback,
            Err(err) => {
                warn!(
                    assignment = assignment_id,
                    index,
                    error = %err,
                    "revision failed, keeping previous feedback"
                );
                return Err(err.into());
            }
        };

        let grade = extract_grade(&revised);
        let states = self.store.update(assignment_id, |states| {
            if let Some(state) = states.get_mut(&index) {
                state.complete(revised, grade.clone());
            }
            Ok(())
        })?;
        info!(
            assignment = assignment_id,
            index,
            grade = grade.as_deref().unwrap_or("-"),
            "feedback revised"
        );

        states.get(&index).cloned().ok_or_else(|| {
            GraderError::Precondition(format!("submission {index} vanished during revision"))
        })
    }

    /// Reviewer view of one stored submission.
    pub fn review_view(&self, assignment_id: &str, index: usize) -> Result<ReviewView, GraderError> {
        validate_assignment_id(assignment_id)?;
        let state = self
            .store
            .get_all(assignment_id)?
            .remove(&index)
            .ok_or_else(|| {
                GraderError::Precondition(format!(
                    "submission {index} of assignment {assignment_id} has no record"
                ))
            })?;
        Ok(ReviewView {
            index,
            status: state.status,
            feedback: state.feedback.as_deref().map(strip_grade_line),
            grade: state.grade,
        })
    }
}
