use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture modes of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Waiting for the first forward pass to succeed
    Loading,
    /// Ready for commands, no passes running
    Idle,
    /// Classifying faces until stopped
    DetectLoop,
    /// Classifying until one face is seen
    DetectSingle,
    /// Collecting samples for a new identity
    Enroll,
}

impl CaptureMode {
    /// Whether forward passes run in this mode
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CaptureMode::DetectLoop | CaptureMode::DetectSingle | CaptureMode::Enroll
        )
    }

    pub fn is_detecting(&self) -> bool {
        matches!(self, CaptureMode::DetectLoop | CaptureMode::DetectSingle)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureMode::Loading => "loading",
            CaptureMode::Idle => "idle",
            CaptureMode::DetectLoop => "realtime detection",
            CaptureMode::DetectSingle => "single detection",
            CaptureMode::Enroll => "enrollment",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_modes() {
        assert!(!CaptureMode::Loading.is_active());
        assert!(!CaptureMode::Idle.is_active());
        assert!(CaptureMode::DetectLoop.is_active());
        assert!(CaptureMode::DetectSingle.is_active());
        assert!(CaptureMode::Enroll.is_active());
        assert!(!CaptureMode::Enroll.is_detecting());
    }

    #[test]
    fn test_mode_serializes_by_name() {
        let json = serde_json::to_string(&CaptureMode::DetectLoop).unwrap();
        assert_eq!(json, "\"DetectLoop\"");
        assert_eq!(CaptureMode::DetectSingle.to_string(), "single detection");
    }
}
