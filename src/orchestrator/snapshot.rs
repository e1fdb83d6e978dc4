use serde::Serialize;

use crate::capture::CaptureState;
use crate::model::Session;

/// Immutable view of orchestrator state published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub capture_state: CaptureState,

    /// Session the UI is currently looking at
    pub current_session: Option<Session>,

    /// Whether a usable API key has been saved
    pub ai_configured: bool,

    /// Latest user-facing status line
    pub message: Option<String>,
}

impl Snapshot {
    pub fn is_recording(&self) -> bool {
        self.capture_state == CaptureState::Capturing
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            capture_state: CaptureState::Idle,
            current_session: None,
            ai_configured: false,
            message: None,
        }
    }
}
