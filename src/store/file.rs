use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AssignmentStates, StateStore, StoreError};

/// One JSON document per assignment inside a directory.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssignmentDocument {
    assignment_id: String,
    submissions: AssignmentStates,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, assignment_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(assignment_id)))
    }

    fn load(&self, assignment_id: &str) -> Result<AssignmentStates, StoreError> {
        let path = self.path_for(assignment_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AssignmentStates::new()),
            Err(e) => return Err(e.into()),
        };
        let doc: AssignmentDocument = serde_json::from_str(&contents)?;
        Ok(doc.submissions)
    }

    fn save(&self, assignment_id: &str, states: &AssignmentStates) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(assignment_id);
        let tmp = path.with_extension("json.tmp");
        let doc = AssignmentDocument {
            assignment_id: assignment_id.to_string(),
            submissions: states.clone(),
        };
        fs::write(&tmp, serde_json::to_string_pretty(&doc)?)?;
        fs::rename(&tmp, &path)?;
        debug!(assignment = assignment_id, path = %path.display(), "state written");
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get_all(&self, assignment_id: &str) -> Result<AssignmentStates, StoreError> {
        self.load(assignment_id)
    }

    fn update<F>(&self, assignment_id: &str, change: F) -> Result<AssignmentStates, StoreError>
    where
        F: FnOnce(&mut AssignmentStates) -> Result<(), StoreError>,
    {
        let _guard = self.write_lock.lock();
        let mut states = self.load(assignment_id)?;
        change(&mut states)?;
        self.save(assignment_id, &states)?;
        Ok(states)
    }

    fn clear(&self, assignment_id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.path_for(assignment_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Maps an assignment id to a unique, filesystem-safe stem by escaping every
/// byte outside `[A-Za-z0-9_-]` as `%XX`.
fn file_stem(assignment_id: &str) -> String {
    let mut stem = String::with_capacity(assignment_id.len());
    for byte in assignment_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}
