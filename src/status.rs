use serde::Serialize;
use std::fmt;

/// Lifecycle status of an audio-synthesis job.
///
/// The only worker-path transitions are PENDING -> PROCESSING and
/// PROCESSING -> COMPLETE | ERROR. COMPLETE and ERROR are terminal;
/// nothing leaves them except an explicit administrative override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    /// Status string as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
        }
    }

    /// Parse a stored status string
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "PROCESSING" => Some(JobStatus::Processing),
            "COMPLETE" => Some(JobStatus::Complete),
            "ERROR" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// COMPLETE and ERROR are terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Whether `self -> next` is a legal worker-path transition
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Complete)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
