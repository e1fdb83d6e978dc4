use anyhow::Result;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// System audio source a recorder can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioSource {
    /// Mix of everything the device is playing
    RemoteSubmix,
    /// Raw input without processing
    Unprocessed,
    /// Voice-call tuned input, last resort
    VoiceCommunication,
}

impl AudioSource {
    /// Sources in the order they are tried
    pub const PRIORITY: [AudioSource; 3] = [
        AudioSource::RemoteSubmix,
        AudioSource::Unprocessed,
        AudioSource::VoiceCommunication,
    ];
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioSource::RemoteSubmix => "REMOTE_SUBMIX",
            AudioSource::Unprocessed => "UNPROCESSED",
            AudioSource::VoiceCommunication => "VOICE_COMMUNICATION",
        };
        f.write_str(name)
    }
}

/// Opaque, single-use token issued by the host after the user consents to
/// screen capture
#[derive(Debug, PartialEq, Eq)]
pub struct CaptureGrant {
    token: String,
}

impl CaptureGrant {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Encoding parameters for a recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u32,
    pub frame_rate: u32,
    /// Only applied when an audio source was attached
    pub audio_sample_rate: u32,
    pub audio_bitrate: u32,
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            width: 360,
            height: 640,
            video_bitrate: 800_000,
            frame_rate: 15,
            audio_sample_rate: 22_050,
            audio_bitrate: 64_000,
        }
    }
}

/// Audio/video recorder writing an MPEG-4 file
///
/// Platform-specific implementations wrap the host media recorder. Calls are
/// made in the order: `set_audio_source` (optional, with `reset` between
/// rejected attempts), `configure`, `prepare`, `start`, `stop`, `release`.
pub trait ScreenRecorder: Send {
    fn set_audio_source(&mut self, source: AudioSource) -> Result<()>;

    /// Return to a freshly created state after a rejected configuration
    fn reset(&mut self) -> Result<()>;

    fn configure(&mut self, output: &Path, profile: &VideoProfile, with_audio: bool) -> Result<()>;

    fn prepare(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;

    /// Get recorder name for logging
    fn name(&self) -> &str;
}

/// Display surface mirroring the screen into a recorder
pub trait VirtualDisplay: Send {
    fn release(&mut self) -> Result<()>;
}

/// Live capture authorization obtained from a grant
pub trait Projection: Send {
    fn create_display(
        &mut self,
        profile: &VideoProfile,
        recorder: &mut dyn ScreenRecorder,
    ) -> Result<Box<dyn VirtualDisplay>>;

    /// Give the capture authorization back to the host
    fn stop(&mut self) -> Result<()>;
}

/// Host services a capture session depends on
pub trait CapturePlatform: Send + Sync {
    /// Register as a long-running, user-visible operation
    fn enter_foreground(&self) -> Result<()>;

    fn exit_foreground(&self) -> Result<()>;

    fn open_projection(&self, grant: CaptureGrant) -> Result<Box<dyn Projection>>;

    fn create_recorder(&self) -> Result<Box<dyn ScreenRecorder>>;
}

/// Attach the first audio source the recorder accepts, resetting it after
/// each rejection. Returns `None` when every source is rejected; the recorder
/// is then left reset for video-only capture.
pub fn select_audio_source(
    recorder: &mut dyn ScreenRecorder,
    sources: &[AudioSource],
) -> Option<AudioSource> {
    for &source in sources {
        match recorder.set_audio_source(source) {
            Ok(()) => {
                info!("Audio source set on {}: {}", recorder.name(), source);
                return Some(source);
            }
            Err(e) => {
                warn!("Failed to set audio source {}: {}", source, e);
                if let Err(reset_err) = recorder.reset() {
                    warn!("Error resetting recorder: {}", reset_err);
                }
            }
        }
    }

    warn!("No system audio source available, continuing with video-only recording");
    None
}
