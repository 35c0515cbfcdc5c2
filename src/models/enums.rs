use serde::{Deserialize, Serialize};

/// Lifecycle status of an uploaded document.
///
/// `Completed` and `Failed` are terminal: a failed document is never retried
/// automatically; re-uploading creates a fresh document in `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// The only legal edges are pending→processing, processing→completed,
    /// and processing→failed. Everything else (including any edge out of a
    /// terminal state) is rejected by the repository layer.
    pub fn can_transition(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity attached to a red-flag finding by the summarization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlagSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl RedFlagSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for RedFlagSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_roundtrip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            let s = status.as_str();
            assert_eq!(ProcessingStatus::from_str(s), Some(status), "Roundtrip failed for {s}");
        }
    }

    #[test]
    fn processing_status_from_invalid() {
        assert_eq!(ProcessingStatus::from_str("done"), None);
        assert_eq!(ProcessingStatus::from_str(""), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!ProcessingStatus::Pending.is_terminal());
        assert!(!ProcessingStatus::Processing.is_terminal());
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(ProcessingStatus::Failed.is_terminal());
    }

    #[test]
    fn legal_transitions() {
        assert!(ProcessingStatus::Pending.can_transition(ProcessingStatus::Processing));
        assert!(ProcessingStatus::Processing.can_transition(ProcessingStatus::Completed));
        assert!(ProcessingStatus::Processing.can_transition(ProcessingStatus::Failed));
    }

    #[test]
    fn illegal_transitions_rejected() {
        // No edge leaves a terminal state.
        for terminal in [ProcessingStatus::Completed, ProcessingStatus::Failed] {
            for next in [
                ProcessingStatus::Pending,
                ProcessingStatus::Processing,
                ProcessingStatus::Completed,
                ProcessingStatus::Failed,
            ] {
                assert!(!terminal.can_transition(next), "{terminal} -> {next} must be illegal");
            }
        }
        // Skipping the processing claim is illegal too.
        assert!(!ProcessingStatus::Pending.can_transition(ProcessingStatus::Completed));
        assert!(!ProcessingStatus::Pending.can_transition(ProcessingStatus::Failed));
        assert!(!ProcessingStatus::Processing.can_transition(ProcessingStatus::Pending));
    }

    #[test]
    fn processing_status_serde() {
        let json = serde_json::to_string(&ProcessingStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let parsed: ProcessingStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, ProcessingStatus::Failed);
    }

    #[test]
    fn severity_roundtrip() {
        for sev in [
            RedFlagSeverity::Critical,
            RedFlagSeverity::High,
            RedFlagSeverity::Medium,
            RedFlagSeverity::Low,
        ] {
            assert_eq!(RedFlagSeverity::from_str(sev.as_str()), Some(sev));
        }
        assert_eq!(RedFlagSeverity::from_str("fatal"), None);
    }

    #[test]
    fn severity_serde_is_snake_case() {
        let json = serde_json::to_string(&RedFlagSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
