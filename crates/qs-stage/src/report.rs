//! Post-spin pipeline report

use serde::{Deserialize, Serialize};

/// Result of one pipeline task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Disabled by configuration
    Skipped,
    /// Completed
    Succeeded,
    /// Failed; the message is the task's error
    Failed(String),
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Informational summary of the persist / upload / print fan-out.
///
/// The report never decides anything; the controller returns to idle
/// regardless of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// SHA-256 (hex) of the blob handed to the store and verifier
    pub checksum: String,
    pub persist: TaskStatus,
    pub upload: TaskStatus,
    /// Identifier returned by the verifier when the upload succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_checksum: Option<String>,
    pub print: TaskStatus,
}

impl PipelineReport {
    /// Report for a pipeline that never ran its tasks (e.g. the task panicked)
    pub fn aborted(checksum: impl Into<String>, reason: &str) -> Self {
        let failed = TaskStatus::Failed(reason.to_string());
        Self {
            checksum: checksum.into(),
            persist: failed.clone(),
            upload: failed.clone(),
            verified_checksum: None,
            print: failed,
        }
    }

    /// Number of tasks that failed
    pub fn failures(&self) -> usize {
        [&self.persist, &self.upload, &self.print]
            .into_iter()
            .filter(|s| s.is_failed())
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_failures() {
        let report = PipelineReport {
            checksum: "ab".into(),
            persist: TaskStatus::Succeeded,
            upload: TaskStatus::Failed("503".into()),
            verified_checksum: None,
            print: TaskStatus::Skipped,
        };
        assert_eq!(report.failures(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_aborted_report() {
        let report = PipelineReport::aborted("ff", "panicked");
        assert_eq!(report.failures(), 3);
        assert_eq!(report.checksum, "ff");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Failed("disk full".into())).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("disk full"));
    }
}
