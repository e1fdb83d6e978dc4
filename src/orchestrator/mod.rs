//! Top-level coordination of capture, upload and analysis
//!
//! `SessionOrchestrator` is the single writer of the current-session cursor
//! and the AI configuration. Consumers observe it through immutable
//! [`Snapshot`]s; host completion events are fed back in through
//! [`forward_capture_events`].

mod events;
mod orchestrator;
mod snapshot;

pub use events::forward_capture_events;
pub use orchestrator::{SessionOrchestrator, RECENT_FILES_FOR_ANALYSIS};
pub use snapshot::Snapshot;
