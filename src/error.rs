//! Error kinds for the upload, analysis and capture paths.

use std::fmt;
use std::path::PathBuf;

/// Failure of the two-phase resumable upload
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File is missing or empty: {0}")]
    EmptyOrMissingFile(PathBuf),

    #[error("Gemini API key is not configured")]
    Unconfigured,

    #[error("Failed to initiate upload: {0}")]
    InitiateFailed(String),

    #[error("Failed to transfer file data: {0}")]
    TransferFailed(String),

    #[error("Network timeout during upload")]
    NetworkTimeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UploadError::NetworkTimeout
        } else {
            UploadError::Http(err.to_string())
        }
    }
}

/// Failure of a generateContent call
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Gemini API key is not configured")]
    Unconfigured,

    #[error("File {0} is not ready for analysis")]
    FileNotReady(String),

    #[error("Model returned no usable text")]
    EmptyResponse,

    #[error("Request failed (status {status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network timeout during analysis")]
    NetworkTimeout,

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::NetworkTimeout
        } else {
            AnalysisError::Http(err.to_string())
        }
    }
}

/// Setup step that failed while bringing a capture up
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStage {
    Foreground,
    Projection,
    Recorder,
    Display,
    Start,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStage::Foreground => "foreground registration",
            SetupStage::Projection => "capture projection",
            SetupStage::Recorder => "recorder",
            SetupStage::Display => "virtual display",
            SetupStage::Start => "recorder start",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("Screen capture permission was denied")]
    PermissionDenied,

    #[error("A capture session is already active")]
    CaptureActive,

    #[error("Invalid capture transition from {0}")]
    InvalidState(String),

    #[error("Capture setup failed at {stage}: {reason}")]
    SetupFailure { stage: SetupStage, reason: String },

    #[error("Failed to record session: {0}")]
    Storage(String),
}
