use serde::{Deserialize, Serialize};
use std::fmt;

/// Job lifecycle status
///
/// ```text
/// UPLOADING -> ASSEMBLING -> UPLOADED -> RUNNING <-> PAUSED
///                  |                        |
///                  v                        v
///          CANCELLED / FAILED     COMPLETED / CANCELLED / FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepting chunks
    Uploading,
    /// Chunks are being merged into one file
    Assembling,
    /// Merged file is stored in the blob store
    Uploaded,
    /// Stream processor is consuming lines
    Running,
    /// Stream processor is suspended between lines
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal statuses are never left once entered
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "UPLOADING",
            Self::Assembling => "ASSEMBLING",
            Self::Uploaded => "UPLOADED",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_upper_case() {
        assert_eq!(serde_json::to_string(&JobStatus::Uploading).unwrap(), "\"UPLOADING\"");
        assert_eq!(JobStatus::Completed.to_string(), "COMPLETED");
        let parsed: JobStatus = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(parsed, JobStatus::Paused);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(!JobStatus::Uploading.is_terminal());
    }
}
