use serde::Serialize;
use std::fmt;

/// Where an upload is in the validation state machine.
///
/// Transitions only move forward; any stage can end in `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Received,
    Sniffing,
    PolicyCheck,
    PatternScan,
    MalwareScan,
    ImageNormalize,
    Hashing,
    Complete,
    Rejected,
}

impl ValidationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStage::Received => "received",
            ValidationStage::Sniffing => "sniffing",
            ValidationStage::PolicyCheck => "policy_check",
            ValidationStage::PatternScan => "pattern_scan",
            ValidationStage::MalwareScan => "malware_scan",
            ValidationStage::ImageNormalize => "image_normalize",
            ValidationStage::Hashing => "hashing",
            ValidationStage::Complete => "complete",
            ValidationStage::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ValidationStage::Complete | ValidationStage::Rejected)
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stages() {
        assert!(ValidationStage::Complete.is_terminal());
        assert!(ValidationStage::Rejected.is_terminal());
        assert!(!ValidationStage::Sniffing.is_terminal());
    }

    #[test]
    fn test_display_matches_serialization() {
        let json = serde_json::to_value(ValidationStage::PolicyCheck).unwrap();
        assert_eq!(json, ValidationStage::PolicyCheck.to_string());
    }
}
