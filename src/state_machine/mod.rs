mod job;
mod state;

pub use job::{
    CancelHandle, GradingCriteria, GradingJob, JobReport, ProgressSummary, Roster, Submission,
};
pub use state::{SubmissionState, SubmissionStatus};
