//! Durable per-assignment submission state.
//!
//! [`StateStore`] is the only shared mutable resource of the grader. Backends
//! provide three primitives (`get_all`, `update`, `clear`); the record-level
//! operations are built on `update`, which applies a batch of changes to one
//! assignment atomically.
//!
//! The store enforces the record invariants itself: a result always leaves a
//! record `Completed`, any other status clears feedback and grade, and a
//! record cannot be marked `Completed` without feedback.

mod file;
mod memory;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::state_machine::{SubmissionState, SubmissionStatus};

pub use file::FileStore;
pub use memory::MemoryStore;

/// All records of one assignment, keyed by submission index.
pub type AssignmentStates = BTreeMap<usize, SubmissionState>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("submission {index} of assignment {assignment_id} has no feedback to complete with")]
    MissingFeedback { assignment_id: String, index: usize },
}

pub trait StateStore: Send + Sync {
    /// Every record of the assignment; empty when nothing was stored yet.
    fn get_all(&self, assignment_id: &str) -> Result<AssignmentStates, StoreError>;

    /// Apply `change` to the assignment's records and persist the result as
    /// one write. Nothing is written when `change` fails.
    fn update<F>(&self, assignment_id: &str, change: F) -> Result<AssignmentStates, StoreError>
    where
        F: FnOnce(&mut AssignmentStates) -> Result<(), StoreError>;

    /// Remove every record of the assignment.
    fn clear(&self, assignment_id: &str) -> Result<(), StoreError>;

    /// Create `idle` records for indices that have none, leaving existing
    /// ones untouched, and return all records.
    fn ensure(&self, assignment_id: &str, indices: &[usize]) -> Result<AssignmentStates, StoreError> {
        let current = self.get_all(assignment_id)?;
        if indices.iter().all(|i| current.contains_key(i)) {
            return Ok(current);
        }
        self.update(assignment_id, |states| {
            for &index in indices {
                states.entry(index).or_insert_with(SubmissionState::idle);
            }
            Ok(())
        })
    }

    fn set_status(
        &self,
        assignment_id: &str,
        index: usize,
        status: SubmissionStatus,
    ) -> Result<(), StoreError> {
        self.set_statuses(assignment_id, &[index], status)
    }

    /// Set the same status on several records in a single write.
    fn set_statuses(
        &self,
        assignment_id: &str,
        indices: &[usize],
        status: SubmissionStatus,
    ) -> Result<(), StoreError> {
        self.update(assignment_id, |states| {
            for &index in indices {
                let state = states.entry(index).or_insert_with(SubmissionState::idle);
                if status == SubmissionStatus::Completed {
                    if state.feedback.is_none() {
                        return Err(StoreError::MissingFeedback {
                            assignment_id: assignment_id.to_string(),
                            index,
                        });
                    }
                    state.status = status;
                } else {
                    state.mark(status);
                }
            }
            Ok(())
        })
        .map(|_| ())
    }

    /// Store evaluator output and mark the record `Completed`.
    fn set_result(
        &self,
        assignment_id: &str,
        index: usize,
        feedback: &str,
        grade: Option<&str>,
    ) -> Result<(), StoreError> {
        self.update(assignment_id, |states| {
            states
                .entry(index)
                .or_insert_with(SubmissionState::idle)
                .complete(feedback.to_string(), grade.map(str::to_string));
            Ok(())
        })
        .map(|_| ())
    }
}
