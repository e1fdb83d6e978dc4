use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{
    select_audio_source, AudioSource, CaptureGrant, CapturePlatform, Projection, ScreenRecorder,
    VideoProfile, VirtualDisplay,
};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, SetupStage};
use crate::model::SessionId;

/// Lifecycle of one capture attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    PermissionRequested,
    Capturing,
    Stopping,
    Stopped,
    Error { reason: String },
}

impl CaptureState {
    /// Whether a new capture may be requested from this state
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            CaptureState::Idle | CaptureState::Stopped | CaptureState::Error { .. }
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => f.write_str("idle"),
            CaptureState::PermissionRequested => f.write_str("permission requested"),
            CaptureState::Capturing => f.write_str("capturing"),
            CaptureState::Stopping => f.write_str("stopping"),
            CaptureState::Stopped => f.write_str("stopped"),
            CaptureState::Error { reason } => write!(f, "error ({})", reason),
        }
    }
}

/// Completion notification emitted once per stopped capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Stopped {
        session_id: SessionId,
        output_path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStep {
    StopRecorder,
    ReleaseRecorder,
    ReleaseDisplay,
    ReleaseProjection,
    ExitForeground,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownFailure {
    pub step: TeardownStep,
    pub reason: String,
}

/// Outcome of stopping a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub session_id: Option<SessionId>,
    /// Recording file, possibly partial
    pub output_path: Option<PathBuf>,
    pub audio_source: Option<AudioSource>,
    /// Teardown steps that failed and were skipped over
    pub failures: Vec<TeardownFailure>,
}

/// Where and how recordings are written
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    pub profile: VideoProfile,
    pub monitor_interval: Duration,
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            profile: VideoProfile::default(),
            monitor_interval: Duration::from_secs(config.monitor_interval_secs),
        }
    }
}

/// State machine for a single screen recording
pub struct CaptureSession {
    platform: Arc<dyn CapturePlatform>,
    settings: CaptureSettings,
    events: mpsc::Sender<CaptureEvent>,
    state: CaptureState,
    session_id: Option<SessionId>,
    output_path: Option<PathBuf>,
    audio_source: Option<AudioSource>,
    in_foreground: bool,
    projection: Option<Box<dyn Projection>>,
    recorder: Option<Box<dyn ScreenRecorder>>,
    recorder_started: bool,
    display: Option<Box<dyn VirtualDisplay>>,
    /// Cleared on stop; read by the monitor task
    is_recording: Arc<AtomicBool>,
    monitor_handle: Option<JoinHandle<()>>,
}

impl CaptureSession {
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        settings: CaptureSettings,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Self {
        Self {
            platform,
            settings,
            events,
            state: CaptureState::Idle,
            session_id: None,
            output_path: None,
            audio_source: None,
            in_foreground: false,
            projection: None,
            recorder: None,
            recorder_started: false,
            display: None,
            is_recording: Arc::new(AtomicBool::new(false)),
            monitor_handle: None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        self.output_path.as_ref()
    }

    pub fn audio_source(&self) -> Option<AudioSource> {
        self.audio_source
    }

    /// Start request: wait for the host to deliver a capture grant
    pub fn request_permission(&mut self) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Idle => {
                info!("Requesting screen capture permission");
                self.state = CaptureState::PermissionRequested;
                Ok(())
            }
            CaptureState::PermissionRequested => Ok(()),
            _ => Err(CaptureError::InvalidState(self.state.to_string())),
        }
    }

    /// The user declined the consent dialog
    pub fn permission_denied(&mut self) {
        if self.state == CaptureState::PermissionRequested {
            warn!("Screen capture permission denied");
            self.state = CaptureState::Idle;
        }
    }

    /// Bring capture up for `session_id` using the host grant
    ///
    /// Order: foreground registration, projection + recorder configuration,
    /// virtual display, recorder start. Any failure leaves the session in
    /// `Error` with every acquired resource released.
    pub async fn on_grant(
        &mut self,
        session_id: SessionId,
        grant: CaptureGrant,
    ) -> Result<PathBuf, CaptureError> {
        if self.state != CaptureState::PermissionRequested {
            return Err(CaptureError::InvalidState(self.state.to_string()));
        }

        info!("Capture grant received for session {}", session_id);
        self.session_id = Some(session_id);

        if let Err(e) = self.platform.enter_foreground() {
            error!("Error registering foreground operation: {:#}", e);
            return Err(self.fail(SetupStage::Foreground, e));
        }
        self.in_foreground = true;

        match self.acquire(session_id, grant) {
            Ok(path) => {
                self.state = CaptureState::Capturing;
                self.is_recording.store(true, Ordering::SeqCst);
                self.spawn_monitor(session_id);
                info!("Recording started: {}", path.display());
                Ok(path)
            }
            Err(failure) => {
                let (stage, reason) = match &failure {
                    CaptureError::SetupFailure { stage, reason } => (*stage, reason.clone()),
                    other => (SetupStage::Start, other.to_string()),
                };
                error!("Capture setup failed at {}: {}", stage, reason);
                for teardown in self.release_resources() {
                    warn!("Cleanup after failed setup: {:?}: {}", teardown.step, teardown.reason);
                }
                self.state = CaptureState::Error { reason };
                Err(failure)
            }
        }
    }

    fn fail(&mut self, stage: SetupStage, err: anyhow::Error) -> CaptureError {
        let reason = format!("{:#}", err);
        self.state = CaptureState::Error {
            reason: reason.clone(),
        };
        CaptureError::SetupFailure { stage, reason }
    }

    fn acquire(&mut self, session_id: SessionId, grant: CaptureGrant) -> Result<PathBuf, CaptureError> {
        let setup = |stage: SetupStage| {
            move |e: anyhow::Error| CaptureError::SetupFailure {
                stage,
                reason: format!("{:#}", e),
            }
        };

        let projection = self.projection.insert(
            self.platform
                .open_projection(grant)
                .map_err(setup(SetupStage::Projection))?,
        );

        std::fs::create_dir_all(&self.settings.output_dir).map_err(|e| {
            CaptureError::SetupFailure {
                stage: SetupStage::Recorder,
                reason: format!("Failed to create output directory: {}", e),
            }
        })?;
        let output = self
            .settings
            .output_dir
            .join(format!("screen_recording_{}.mp4", session_id));
        self.output_path = Some(output.clone());

        let recorder = self
            .platform
            .create_recorder()
            .map_err(setup(SetupStage::Recorder))?;
        let recorder = self.recorder.insert(recorder);

        self.audio_source = select_audio_source(recorder.as_mut(), &AudioSource::PRIORITY);
        recorder
            .configure(&output, &self.settings.profile, self.audio_source.is_some())
            .map_err(setup(SetupStage::Recorder))?;
        recorder.prepare().map_err(setup(SetupStage::Recorder))?;
        debug!("Recorder {} prepared", recorder.name());

        let display = projection
            .create_display(&self.settings.profile, recorder.as_mut())
            .map_err(setup(SetupStage::Display))?;
        self.display = Some(display);
        debug!("Virtual display created");

        recorder.start().map_err(setup(SetupStage::Start))?;
        self.recorder_started = true;

        Ok(output)
    }

    fn spawn_monitor(&mut self, session_id: SessionId) {
        let is_recording = Arc::clone(&self.is_recording);
        let period = self.settings.monitor_interval.max(Duration::from_millis(1));

        self.monitor_handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            while is_recording.load(Ordering::SeqCst) {
                ticker.tick().await;
                debug!("Capture monitor for session {}: recorder active", session_id);
            }
        }));
    }

    /// Stop capturing (explicit request or grant revoked by the host)
    ///
    /// Every teardown step is attempted even when earlier ones fail. The
    /// output path is always reported and the completion event is sent.
    pub async fn stop(&mut self) -> Result<StopReport, CaptureError> {
        if self.state != CaptureState::Capturing {
            return Err(CaptureError::InvalidState(self.state.to_string()));
        }

        info!("Stopping capture for session {:?}", self.session_id);
        self.state = CaptureState::Stopping;

        let failures = self.release_resources();
        for failure in &failures {
            warn!("Teardown step {:?} failed: {}", failure.step, failure.reason);
        }

        self.state = CaptureState::Stopped;

        let report = StopReport {
            session_id: self.session_id,
            output_path: self.output_path.clone(),
            audio_source: self.audio_source,
            failures,
        };

        if let Some(session_id) = self.session_id {
            let event = CaptureEvent::Stopped {
                session_id,
                output_path: self.output_path.clone(),
            };
            if let Err(e) = self.events.send(event).await {
                error!("Failed to deliver capture stopped event: {}", e);
            }
        }

        info!("Capture stopped for session {:?}", self.session_id);
        Ok(report)
    }

    /// Release everything held, in order, collecting failures
    fn release_resources(&mut self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        let mut attempt = |step: TeardownStep, result: anyhow::Result<()>| {
            if let Err(e) = result {
                failures.push(TeardownFailure {
                    step,
                    reason: format!("{:#}", e),
                });
            }
        };

        self.is_recording.store(false, Ordering::SeqCst);
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }

        if let Some(mut recorder) = self.recorder.take() {
            if self.recorder_started {
                attempt(TeardownStep::StopRecorder, recorder.stop());
                self.recorder_started = false;
            }
            attempt(TeardownStep::ReleaseRecorder, recorder.release());
        }

        if let Some(mut display) = self.display.take() {
            attempt(TeardownStep::ReleaseDisplay, display.release());
        }

        if let Some(mut projection) = self.projection.take() {
            attempt(TeardownStep::ReleaseProjection, projection.stop());
        }

        if self.in_foreground {
            self.in_foreground = false;
            attempt(TeardownStep::ExitForeground, self.platform.exit_foreground());
        }

        failures
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        for failure in self.release_resources() {
            warn!("Teardown on drop: {:?}: {}", failure.step, failure.reason);
        }
    }
}
