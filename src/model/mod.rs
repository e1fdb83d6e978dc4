//! Records driving the capture and analysis pipeline
//!
//! - `Session`: one screen recording and its lifecycle timestamps
//! - `ActivityEvent`: app/screen events observed during a session
//! - `UploadedFile`: history of files uploaded to the inference service
//! - `AiConfig`: credential and generation parameters
//! - `Insight` / `InsightReport` / `SummaryReport`: analysis results

mod ai;
mod event;
mod insight;
mod session;
mod upload;

pub use ai::{AiConfig, DEFAULT_API_KEY, DEFAULT_MODEL};
pub(crate) use ai::is_usable_key;
pub(crate) use session::format_duration;
pub use event::{ActivityEvent, EventKind};
pub use insight::{Insight, InsightKind, InsightReport, SummaryReport};
pub use session::{Session, SessionId, SessionIdGenerator};
pub use upload::{RemoteHandle, UploadedFile};
