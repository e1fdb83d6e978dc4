pub mod capture;
pub mod config;
pub mod error;
pub mod gemini;
pub mod http;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod store;

pub use capture::{
    AudioSource, CaptureEvent, CaptureGrant, CapturePlatform, CaptureSession, CaptureSettings,
    CaptureState, StopReport, UnsupportedPlatform,
};
pub use config::Config;
pub use error::{AnalysisError, CaptureError, SetupStage, UploadError};
pub use gemini::{FileUploader, GeminiHttp, InferenceClient, PollPolicy};
pub use http::{create_router, AppState};
pub use model::{
    ActivityEvent, AiConfig, EventKind, Insight, InsightKind, InsightReport, RemoteHandle, Session,
    SessionId, SummaryReport, UploadedFile,
};
pub use orchestrator::{forward_capture_events, SessionOrchestrator, Snapshot};
pub use store::{MemoryStore, Store};
