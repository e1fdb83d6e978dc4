//! Gemini REST integration
//!
//! - `upload`: two-phase resumable upload and readiness polling
//! - `inference`: generateContent requests over uploaded files or text context
//! - `messages`: wire types for the file and generation endpoints

mod client;
pub mod inference;
pub mod messages;
pub mod upload;

pub use client::GeminiHttp;
pub use inference::InferenceClient;
pub use upload::{mime_type_for, FileUploader, PollPolicy};
