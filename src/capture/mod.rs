//! Screen capture lifecycle
//!
//! This module provides the `CaptureSession` state machine that manages:
//! - Foreground registration before any capture resource is acquired
//! - Recorder configuration with ordered system-audio fallback
//! - Virtual display binding and recorder start
//! - Guaranteed teardown and the single "capture stopped" event
//!
//! Host-specific pieces (projection, recorder, display) are injected through
//! the traits in [`backend`].

pub mod backend;
mod session;
mod unsupported;

pub use backend::{
    select_audio_source, AudioSource, CaptureGrant, CapturePlatform, Projection, ScreenRecorder,
    VideoProfile, VirtualDisplay,
};
pub use session::{
    CaptureEvent, CaptureSession, CaptureSettings, CaptureState, StopReport, TeardownFailure,
    TeardownStep,
};
pub use unsupported::UnsupportedPlatform;
