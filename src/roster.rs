//! Roster files handed over by the surrounding course tooling.
//!
//! Either TOML:
//!
//! ```toml
//! [[submissions]]
//! student_name = "Ada Lovelace"
//! document = "uploads/ada.pdf"
//! ```
//!
//! or JSON, as a bare array of the same entries or wrapped in
//! `{"submissions": [...]}`. Order in the file is roster order.

use std::path::Path;

use serde::Deserialize;

use crate::error::GraderError;
use crate::state_machine::Roster;

#[derive(Debug, Deserialize)]
struct RosterEntry {
    student_name: String,
    document: String,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    submissions: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonRoster {
    Wrapped(RosterFile),
    Bare(Vec<RosterEntry>),
}

/// Load a roster, picking the format from the file extension.
pub fn load_roster(path: &Path) -> Result<Roster, GraderError> {
    let contents = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_json(&contents),
        Some("toml") => parse_toml(&contents),
        _ => Err(GraderError::Validation(format!(
            "roster file {} must end in .json or .toml",
            path.display()
        ))),
    }
}

pub fn parse_toml(contents: &str) -> Result<Roster, GraderError> {
    let file: RosterFile = toml::from_str(contents)?;
    build(file.submissions)
}

pub fn parse_json(contents: &str) -> Result<Roster, GraderError> {
    let entries = match serde_json::from_str::<JsonRoster>(contents)? {
        JsonRoster::Wrapped(file) => file.submissions,
        JsonRoster::Bare(entries) => entries,
    };
    build(entries)
}

fn build(entries: Vec<RosterEntry>) -> Result<Roster, GraderError> {
    if entries.is_empty() {
        return Err(GraderError::Validation("roster has no submissions".into()));
    }
    if let Some(position) = entries.iter().position(|e| e.document.trim().is_empty()) {
        return Err(GraderError::Validation(format!(
            "roster entry {position} has no document"
        )));
    }
    Ok(Roster::new(
        entries.into_iter().map(|e| (e.student_name, e.document)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_roster_in_order() {
        let roster = parse_toml(
            r#"
            [[submissions]]
            student_name = "Ada"
            document = "ada.pdf"

            [[submissions]]
            student_name = "Grace"
            document = "grace.pdf"
            "#,
        )
        .unwrap();
        assert_eq!(roster.len(), 2);
        let second = roster.get(1).unwrap();
        assert_eq!(second.student_name, "Grace");
        assert_eq!(second.document, "grace.pdf");
    }

    #[test]
    fn parses_bare_and_wrapped_json() {
        let bare = parse_json(r#"[{"student_name": "Ada", "document": "a.pdf"}]"#).unwrap();
        let wrapped = parse_json(
            r#"{"submissions": [{"student_name": "Ada", "document": "a.pdf"}]}"#,
        )
        .unwrap();
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn empty_roster_is_rejected() {
        assert!(matches!(parse_json("[]"), Err(GraderError::Validation(_))));
    }

    #[test]
    fn blank_document_is_rejected() {
        let err = parse_json(r#"[{"student_name": "Ada", "document": " "}]"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: roster entry 0 has no document"
        );
    }

    #[test]
    fn load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, r#"[{"student_name": "Ada", "document": "a.pdf"}]"#).unwrap();
        assert_eq!(load_roster(&path).unwrap().len(), 1);

        let other = dir.path().join("roster.csv");
        std::fs::write(&other, "Ada,a.pdf").unwrap();
        assert!(matches!(
            load_roster(&other),
            Err(GraderError::Validation(_))
        ));
    }
}
