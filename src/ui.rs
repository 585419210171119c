//! Terminal rendering of grading progress.
//!
//! [`JobProgress`] consumes [`ProgressEvent`]s and drives an indicatif bar,
//! printing one coloured line per finished submission.

use std::collections::BTreeMap;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::ProgressEvent;
use crate::state_machine::{JobReport, ProgressSummary, SubmissionState, SubmissionStatus};

pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                assignment_id,
                total,
            } => {
                self.pb.set_length(*total as u64);
                self.pb.set_message(format!("grading {assignment_id}"));
            }
            ProgressEvent::SubmissionStarted {
                index,
                student_name,
            } => {
                self.pb.set_message(format!("#{index} {student_name}"));
            }
            ProgressEvent::SubmissionCompleted { index, grade } => {
                self.pb.println(format!(
                    "  {} #{index} graded: {}",
                    self.green.apply_to("✓"),
                    grade.as_deref().unwrap_or("(no grade found)")
                ));
                self.pb.inc(1);
            }
            ProgressEvent::SubmissionFailed { index, error } => {
                self.pb.println(format!(
                    "  {} #{index} failed: {error}",
                    self.red.apply_to("✗")
                ));
                self.pb.inc(1);
            }
            ProgressEvent::JobCancelled { skipped } => {
                self.pb.println(format!(
                    "  {} cancelled, {skipped} submission(s) left idle",
                    self.yellow.apply_to("■")
                ));
            }
            ProgressEvent::JobFinished(report) => {
                self.pb.finish_and_clear();
                self.print_report(report);
            }
        }
    }

    /// Clear the bar if the job ended without a final report, e.g. when the
    /// run failed.
    pub fn finish(&self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }

    fn print_report(&self, report: &JobReport) {
        let style = if report.errored > 0 || report.cancelled {
            &self.yellow
        } else {
            &self.green
        };
        println!(
            "{}",
            style.apply_to(format!(
                "{}: {} completed ({} ungraded), {} errored, {} skipped in {}ms",
                report.assignment_id,
                report.completed,
                report.ungraded(),
                report.errored,
                report.skipped,
                report.duration_ms
            ))
        );
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Render stored states as a plain table.
pub fn status_table(states: &BTreeMap<usize, SubmissionState>) -> String {
    let summary = ProgressSummary::from_states(states);
    let mut out = String::new();
    for (index, state) in states {
        out.push_str(&format!(
            "{index:>4}  {:<10}  {}\n",
            state.status.to_string(),
            state.grade.as_deref().unwrap_or("-")
        ));
    }
    out.push_str(&format!(
        "idle {} / processing {} / completed {} / error {}{}\n",
        summary.idle,
        summary.processing,
        summary.completed,
        summary.errored,
        if summary.is_finished() { " (finished)" } else { "" }
    ));
    out
}

/// Style for a status label.
pub fn status_style(status: SubmissionStatus) -> Style {
    match status {
        SubmissionStatus::Completed => Style::new().green(),
        SubmissionStatus::Error => Style::new().red(),
        SubmissionStatus::Processing => Style::new().cyan(),
        SubmissionStatus::Idle => Style::new().dim(),
    }
}
