use std::collections::HashMap;

use parking_lot::Mutex;

use super::{AssignmentStates, StateStore, StoreError};

/// Process-local store, used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    assignments: Mutex<HashMap<String, AssignmentStates>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get_all(&self, assignment_id: &str) -> Result<AssignmentStates, StoreError> {
        Ok(self
            .assignments
            .lock()
            .get(assignment_id)
            .cloned()
            .unwrap_or_default())
    }

    fn update<F>(&self, assignment_id: &str, change: F) -> Result<AssignmentStates, StoreError>
    where
        F: FnOnce(&mut AssignmentStates) -> Result<(), StoreError>,
    {
        let mut assignments = self.assignments.lock();
        let mut next = assignments.get(assignment_id).cloned().unwrap_or_default();
        change(&mut next)?;
        assignments.insert(assignment_id.to_string(), next.clone());
        Ok(next)
    }

    fn clear(&self, assignment_id: &str) -> Result<(), StoreError> {
        self.assignments.lock().remove(assignment_id);
        Ok(())
    }
}
