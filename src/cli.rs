//! Command line interface built on clap.
//!
//! Subcommands map one-to-one onto orchestrator operations; global flags
//! override `gradeflow.toml` and the environment.

use std::future::Future;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::state_machine::CancelHandle;

/// Batch grading of student submissions through an external evaluator.
#[derive(Debug, Parser)]
#[command(name = "gradeflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the evaluation service.
    #[arg(long, global = true)]
    pub evaluator_url: Option<String>,

    /// Attempts per evaluator call before giving up.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Directory holding per-assignment state files.
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Criteria given inline or read from a file.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct CriteriaArgs {
    /// Grading criteria text.
    #[arg(long)]
    pub criteria: Option<String>,

    /// File containing the grading criteria.
    #[arg(long)]
    pub criteria_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grade every submission of a roster, in order.
    Grade {
        #[arg(long)]
        assignment: String,

        /// Roster file (.json or .toml).
        #[arg(long)]
        roster: PathBuf,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    /// Grade a single errored, unstarted or interrupted submission again.
    Retry {
        #[arg(long)]
        assignment: String,

        #[arg(long)]
        roster: PathBuf,

        /// 0-based roster position.
        #[arg(long)]
        index: usize,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    /// Ask the evaluator to rework one submission's feedback.
    Revise {
        #[arg(long)]
        assignment: String,

        #[arg(long)]
        index: usize,

        /// Reviewer guidance for the revision.
        #[arg(long)]
        note: String,
    },

    /// Show stored progress for an assignment.
    Status {
        #[arg(long)]
        assignment: String,

        /// Print raw records as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show one submission's feedback as a reviewer sees it.
    Show {
        #[arg(long)]
        assignment: String,

        #[arg(long)]
        index: usize,
    },

    /// Delete all stored results of an assignment.
    Clear {
        #[arg(long)]
        assignment: String,
    },
}

/// Two-stage interrupt handling for a running job.
///
/// The first interrupt cancels `cancel` so the job stops after the current
/// submission. Returns `true` when a second interrupt arrives, in which case
/// the caller should abort the process. Returns `false` if listening fails.
pub async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: CancelHandle) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("interrupt received, stopping after the current submission; press Ctrl-C again to abort");
    cancel.cancel();

    if interrupt().await.is_err() {
        return false;
    }
    warn!("second interrupt received, aborting");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[tokio::test]
    async fn second_interrupt_requests_abort() {
        let cancel = CancelHandle::new();
        let mut seen = 0;
        let abort = watch_interrupts(
            || {
                seen += 1;
                std::future::ready(Ok(()))
            },
            cancel.clone(),
        )
        .await;
        assert!(abort);
        assert_eq!(seen, 2);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn failed_listener_neither_cancels_nor_aborts() {
        let cancel = CancelHandle::new();
        let abort = watch_interrupts(
            || std::future::ready(Err(std::io::Error::other("no signal handler"))),
            cancel.clone(),
        )
        .await;
        assert!(!abort);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn cli_parses_grade_subcommand() {
        let cli = Cli::parse_from([
            "gradeflow",
            "grade",
            "--assignment",
            "hw1",
            "--roster",
            "roster.toml",
            "--criteria",
            "Grade for clarity",
        ]);
        match cli.command {
            Command::Grade {
                assignment,
                roster,
                criteria,
            } => {
                assert_eq!(assignment, "hw1");
                assert_eq!(roster, PathBuf::from("roster.toml"));
                assert_eq!(criteria.criteria.as_deref(), Some("Grade for clarity"));
                assert!(criteria.criteria_file.is_none());
            }
            _ => panic!("expected Grade command"),
        }
    }

    #[test]
    fn criteria_sources_are_exclusive_and_required() {
        let both = Cli::try_parse_from([
            "gradeflow",
            "grade",
            "--assignment",
            "hw1",
            "--roster",
            "r.json",
            "--criteria",
            "x",
            "--criteria-file",
            "c.txt",
        ]);
        assert!(both.is_err());

        let neither =
            Cli::try_parse_from(["gradeflow", "grade", "--assignment", "hw1", "--roster", "r.json"]);
        assert!(neither.is_err());
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "gradeflow",
            "--max-attempts",
            "3",
            "--store-dir",
            "/tmp/state",
            "--verbose",
            "status",
            "--assignment",
            "hw1",
            "--json",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.max_attempts, Some(3));
        assert_eq!(cli.store_dir, Some(PathBuf::from("/tmp/state")));
        assert!(matches!(cli.command, Command::Status { json: true, .. }));
    }

    #[test]
    fn cli_parses_revise_subcommand() {
        let cli = Cli::parse_from([
            "gradeflow",
            "revise",
            "--assignment",
            "hw1",
            "--index",
            "2",
            "--note",
            "make it harsher",
        ]);
        match cli.command {
            Command::Revise {
                assignment,
                index,
                note,
            } => {
                assert_eq!(assignment, "hw1");
                assert_eq!(index, 2);
                assert_eq!(note, "make it harsher");
            }
            _ => panic!("expected Revise command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
