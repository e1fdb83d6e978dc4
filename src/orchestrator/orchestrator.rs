use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::snapshot::Snapshot;
use crate::capture::{
    CaptureEvent, CaptureGrant, CapturePlatform, CaptureSession, CaptureSettings, CaptureState,
    StopReport,
};
use crate::error::{AnalysisError, CaptureError, UploadError};
use crate::gemini::{mime_type_for, InferenceClient};
use crate::model::{
    ActivityEvent, AiConfig, InsightReport, RemoteHandle, Session, SessionId, SessionIdGenerator,
    UploadedFile,
};
use crate::prompt::{ActivityContext, VIDEO_SUMMARY_PROMPT};
use crate::store::Store;

/// Uploaded files included in a free-form question
pub const RECENT_FILES_FOR_ANALYSIS: usize = 5;

const NO_SESSION_TO_SUMMARIZE: &str = "No active session found to summarize.";
const CONFIGURE_KEY_MESSAGE: &str =
    "Please configure your Gemini API key in settings to analyze screen recordings.";
const FILE_NOT_READY_MESSAGE: &str =
    "Error: Video file is not ready for analysis. Please try again in a moment.";

/// Completion events buffered between the capture and the event loop
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Coordinates capture, persistence, upload and analysis
///
/// At most one capture exists at a time; every capture transition happens
/// while holding the capture slot lock.
pub struct SessionOrchestrator {
    store: Arc<dyn Store>,
    inference: InferenceClient,
    platform: Arc<dyn CapturePlatform>,
    capture_settings: CaptureSettings,
    events_tx: mpsc::Sender<CaptureEvent>,
    ids: SessionIdGenerator,

    capture: Mutex<Option<CaptureSession>>,
    current: RwLock<Option<Session>>,

    /// Loaded from the store on first access
    ai_config: RwLock<Option<AiConfig>>,
    default_ai_config: AiConfig,

    snapshot_tx: watch::Sender<Snapshot>,
}

impl SessionOrchestrator {
    /// Build an orchestrator together with the receiving end of its capture
    /// completion channel. Hand the receiver to
    /// [`forward_capture_events`](super::forward_capture_events).
    pub fn new(
        store: Arc<dyn Store>,
        inference: InferenceClient,
        platform: Arc<dyn CapturePlatform>,
        capture_settings: CaptureSettings,
        default_ai_config: AiConfig,
    ) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(Snapshot::default());

        let orchestrator = Self {
            store,
            inference,
            platform,
            capture_settings,
            events_tx,
            ids: SessionIdGenerator::new(),
            capture: Mutex::new(None),
            current: RwLock::new(None),
            ai_config: RwLock::new(None),
            default_ai_config,
            snapshot_tx,
        };

        (orchestrator, events_rx)
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    fn publish_state(&self, state: &CaptureState) {
        let state = state.clone();
        self.snapshot_tx.send_modify(|snap| snap.capture_state = state);
    }

    fn publish_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.snapshot_tx.send_modify(|snap| snap.message = Some(message));
    }

    async fn set_current(&self, session: Option<Session>) {
        *self.current.write().await = session.clone();
        self.snapshot_tx
            .send_modify(|snap| snap.current_session = session);
    }

    /// Refresh the cursor if it points at `session`
    async fn refresh_current(&self, session: &Session) {
        let mut current = self.current.write().await;
        if current.as_ref().map(|s| s.id) == Some(session.id) {
            *current = Some(session.clone());
            let session = session.clone();
            self.snapshot_tx
                .send_modify(|snap| snap.current_session = Some(session));
        }
    }

    // ------------------------------------------------------------------
    // Capture lifecycle
    // ------------------------------------------------------------------

    /// Ask the host for a capture grant
    pub async fn request_capture(&self) -> Result<(), CaptureError> {
        let mut slot = self.capture.lock().await;

        if let Some(capture) = slot.as_ref() {
            match capture.state() {
                CaptureState::PermissionRequested => return Ok(()),
                CaptureState::Capturing | CaptureState::Stopping => {
                    return Err(CaptureError::CaptureActive)
                }
                _ => {}
            }
        }

        let mut capture = CaptureSession::new(
            self.platform.clone(),
            self.capture_settings.clone(),
            self.events_tx.clone(),
        );
        capture.request_permission()?;
        self.publish_state(capture.state());
        *slot = Some(capture);

        Ok(())
    }

    /// The user declined the consent dialog. No session record is created.
    pub async fn permission_denied(&self) {
        let mut slot = self.capture.lock().await;
        if let Some(capture) = slot.as_mut() {
            capture.permission_denied();
            self.publish_state(capture.state());
        }
        self.publish_message("Screen capture permission denied");
    }

    /// Begin recording with the host grant and return the new session id
    pub async fn start_capture(&self, grant: CaptureGrant) -> Result<SessionId, CaptureError> {
        let mut slot = self.capture.lock().await;

        let capture = match slot.as_mut() {
            Some(capture) if *capture.state() == CaptureState::PermissionRequested => capture,
            Some(capture)
                if matches!(
                    capture.state(),
                    CaptureState::Capturing | CaptureState::Stopping
                ) =>
            {
                return Err(CaptureError::CaptureActive)
            }
            Some(capture) => return Err(CaptureError::InvalidState(capture.state().to_string())),
            None => return Err(CaptureError::InvalidState(CaptureState::Idle.to_string())),
        };

        self.close_stale_sessions().await;

        let session_id = self.ids.next_id();
        let mut session = Session::start(session_id);
        self.store
            .insert_session(&session)
            .await
            .map_err(|e| CaptureError::Storage(e.to_string()))?;
        self.set_current(Some(session.clone())).await;

        info!("Starting capture for session {}", session_id);

        match capture.on_grant(session_id, grant).await {
            Ok(path) => {
                info!("Session {} recording to {}", session_id, path.display());
                self.publish_state(capture.state());
                self.publish_message("Recording started");
                Ok(session_id)
            }
            Err(e) => {
                error!("Capture setup failed for session {}: {}", session_id, e);
                session.finish(Utc::now());
                if let Err(store_err) = self.store.update_session(&session).await {
                    error!("Failed to close session {}: {:#}", session_id, store_err);
                }
                self.set_current(Some(session)).await;
                self.publish_state(capture.state());
                self.publish_message(e.to_string());
                Err(e)
            }
        }
    }

    /// Close any record left active by an earlier run
    async fn close_stale_sessions(&self) {
        loop {
            match self.store.active_session().await {
                Ok(Some(mut stale)) => {
                    warn!("Closing stale active session {}", stale.id);
                    stale.finish(Utc::now());
                    if let Err(e) = self.store.update_session(&stale).await {
                        error!("Failed to close stale session {}: {:#}", stale.id, e);
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    error!("Failed to query active session: {:#}", e);
                    return;
                }
            }
        }
    }

    /// Stop the running capture. Completion is delivered on the event channel.
    pub async fn stop_capture(&self) -> Result<StopReport, CaptureError> {
        let mut slot = self.capture.lock().await;
        let capture = slot
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState(CaptureState::Idle.to_string()))?;

        if *capture.state() == CaptureState::Capturing {
            self.publish_state(&CaptureState::Stopping);
        }
        let report = capture.stop().await?;
        self.publish_state(capture.state());

        if !report.failures.is_empty() {
            warn!(
                "Capture stopped with {} teardown failure(s)",
                report.failures.len()
            );
        }

        Ok(report)
    }

    /// The host revoked the capture grant (e.g. from the system UI)
    pub async fn grant_revoked(&self) -> Result<StopReport, CaptureError> {
        info!("Capture grant revoked by host");
        self.stop_capture().await
    }

    /// Close the session record for a finished capture and upload its file
    ///
    /// Returns the spawned upload task when there is a file to upload.
    pub async fn on_capture_stopped(
        self: &Arc<Self>,
        session_id: SessionId,
        output_path: Option<PathBuf>,
    ) -> Option<JoinHandle<()>> {
        let mut session = match self.store.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!("Capture stopped for unknown session {}", session_id);
                return None;
            }
            Err(e) => {
                error!("Failed to load session {}: {:#}", session_id, e);
                return None;
            }
        };

        if session.is_active {
            session.finish(Utc::now());
        }
        let output_path = output_path.filter(|p| !p.as_os_str().is_empty());
        session.video_path = output_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        if let Err(e) = self.store.update_session(&session).await {
            error!("Failed to close session {}: {:#}", session_id, e);
        }
        info!(
            "Session {} closed after {}",
            session_id,
            session.formatted_duration()
        );
        // A newer capture may already own the cursor
        self.refresh_current(&session).await;

        let path = output_path?;
        self.publish_message("Processing recording...");

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            this.upload_recording(session_id, path).await;
        }))
    }

    async fn upload_recording(&self, session_id: SessionId, path: PathBuf) {
        let config = self.ai_config().await;

        let handle = match self.upload(&path, &config).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Upload of {} failed: {}", path.display(), e);
                self.publish_message(format!("Failed to upload screen recording: {}", e));
                return;
            }
        };

        match self.store.get_session(session_id).await {
            Ok(Some(mut session)) => {
                session.remote_file_uri = Some(handle);
                if let Err(e) = self.store.update_session(&session).await {
                    error!("Failed to store handle for session {}: {:#}", session_id, e);
                }
                self.refresh_current(&session).await;
            }
            Ok(None) => warn!("Session {} vanished during upload", session_id),
            Err(e) => error!("Failed to load session {}: {:#}", session_id, e),
        }

        self.publish_message("Screen recording uploaded successfully!");
    }

    /// Upload a local file and record it in the upload history
    pub async fn upload(&self, path: &Path, config: &AiConfig) -> Result<RemoteHandle, UploadError> {
        let handle = self
            .inference
            .uploader()
            .upload(path, &config.api_key)
            .await?;

        let file_size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        let record = UploadedFile {
            file_uri: handle.clone(),
            local_path: path.to_string_lossy().into_owned(),
            upload_time: Utc::now(),
            file_size,
            mime_type: mime_type_for(path).to_string(),
        };
        if let Err(e) = self.store.insert_uploaded_file(&record).await {
            error!("Failed to record upload of {}: {:#}", path.display(), e);
        }

        Ok(handle)
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    /// Answer a free-form question, preferring recently uploaded recordings
    pub async fn ask(&self, question: &str, session_id: Option<SessionId>) -> String {
        let config = self.ai_config().await;
        let session_id = match session_id {
            Some(id) => Some(id),
            None => self.current_session().await.map(|s| s.id),
        };

        match self.try_ask(question, session_id, &config).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Question failed: {:#}", e);
                user_message("I encountered an error processing your question", &e)
            }
        }
    }

    async fn try_ask(
        &self,
        question: &str,
        session_id: Option<SessionId>,
        config: &AiConfig,
    ) -> Result<String> {
        let recent = self
            .store
            .recent_uploaded_files(RECENT_FILES_FOR_ANALYSIS)
            .await
            .context("Failed to list uploaded files")?;

        if !recent.is_empty() {
            let handles: Vec<String> = recent.into_iter().map(|f| f.file_uri).collect();
            return Ok(self.inference.analyze(&handles, question, config).await?);
        }

        let context = self.load_context(session_id).await?;
        Ok(self.inference.ask(question, &context, config).await?)
    }

    /// Summarize a session, from its recording when one exists locally
    pub async fn summarize(&self, session_id: Option<SessionId>) -> String {
        let session_id = match session_id {
            Some(id) => id,
            None => match self.current_session().await {
                Some(session) => session.id,
                None => return NO_SESSION_TO_SUMMARIZE.to_string(),
            },
        };

        let config = self.ai_config().await;
        match self.try_summarize(session_id, &config).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Summary failed for session {}: {:#}", session_id, e);
                user_message("Error generating summary", &e)
            }
        }
    }

    async fn try_summarize(&self, session_id: SessionId, config: &AiConfig) -> Result<String> {
        let Some(mut session) = self.store.get_session(session_id).await? else {
            return Ok(NO_SESSION_TO_SUMMARIZE.to_string());
        };

        if let Some(handle) = self.video_handle(&mut session, config).await {
            let summary = self
                .inference
                .analyze(&[handle], VIDEO_SUMMARY_PROMPT, config)
                .await?;
            session.summary = Some(summary.clone());
            self.store.update_session(&session).await?;
            self.refresh_current(&session).await;
            return Ok(summary);
        }

        let events = self.store.events_for_session(session_id).await?;
        let context = ActivityContext::new(Some(session.clone()), events);
        let report = self.inference.generate_summary(&context, config).await?;

        session.summary = Some(report.summary.clone());
        self.store.update_session(&session).await?;
        self.refresh_current(&session).await;

        Ok(report.render())
    }

    /// Remote handle for the session's recording, uploading it if needed.
    /// `None` when there is no local recording or the upload failed.
    async fn video_handle(&self, session: &mut Session, config: &AiConfig) -> Option<RemoteHandle> {
        let path = PathBuf::from(session.video_path.as_ref()?);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return None;
        }

        if let Some(handle) = session.remote_file_uri.clone() {
            return Some(handle);
        }

        match self.upload(&path, config).await {
            Ok(handle) => {
                session.remote_file_uri = Some(handle.clone());
                Some(handle)
            }
            Err(e) => {
                warn!(
                    "Upload of {} failed, summarizing from context: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Productivity insights for a session. Failures yield an empty report.
    pub async fn insights(&self, session_id: Option<SessionId>) -> InsightReport {
        let session_id = match session_id {
            Some(id) => id,
            None => match self.current_session().await {
                Some(session) => session.id,
                None => return InsightReport::default(),
            },
        };

        let config = self.ai_config().await;
        match self.try_insights(session_id, &config).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Insight generation failed for session {}: {:#}", session_id, e);
                InsightReport::default()
            }
        }
    }

    async fn try_insights(&self, session_id: SessionId, config: &AiConfig) -> Result<InsightReport> {
        let context = self.load_context(Some(session_id)).await?;
        let report = self
            .inference
            .generate_insights(session_id, &context, config)
            .await?;

        for insight in &report.insights {
            if let Err(e) = self.store.insert_insight(insight).await {
                warn!("Failed to store insight {}: {:#}", insight.id, e);
            }
        }

        if let (Some(score), Some(mut session)) =
            (report.productivity_score, context.session.clone())
        {
            session.productivity_score = Some(score);
            self.store.update_session(&session).await?;
            self.refresh_current(&session).await;
        }

        Ok(report)
    }

    async fn load_context(&self, session_id: Option<SessionId>) -> Result<ActivityContext> {
        let Some(id) = session_id else {
            return Ok(ActivityContext::empty());
        };

        let session = self.store.get_session(id).await?;
        let events = match session {
            Some(_) => self.store.events_for_session(id).await?,
            None => Vec::new(),
        };

        Ok(ActivityContext::new(session, events))
    }

    // ------------------------------------------------------------------
    // Records and configuration
    // ------------------------------------------------------------------

    pub async fn record_event(&self, event: ActivityEvent) -> Result<()> {
        self.store
            .insert_event(&event)
            .await
            .with_context(|| format!("Failed to record event for session {}", event.session_id))
    }

    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        self.store.recent_sessions(limit).await
    }

    /// Current AI configuration, loaded from the store on first access
    pub async fn ai_config(&self) -> AiConfig {
        if let Some(config) = self.ai_config.read().await.clone() {
            return config;
        }

        let mut guard = self.ai_config.write().await;
        if let Some(config) = guard.clone() {
            return config;
        }

        let config = match self.store.load_ai_config().await {
            Ok(Some(config)) => config,
            Ok(None) => self.default_ai_config.clone(),
            Err(e) => {
                warn!("Failed to load AI config, using defaults: {:#}", e);
                self.default_ai_config.clone()
            }
        };

        let configured = config.is_configured();
        self.snapshot_tx
            .send_modify(|snap| snap.ai_configured = configured);
        *guard = Some(config.clone());
        config
    }

    pub async fn save_ai_config(&self, config: AiConfig) -> Result<()> {
        self.store.save_ai_config(&config).await?;

        let configured = config.is_configured();
        *self.ai_config.write().await = Some(config);
        self.snapshot_tx
            .send_modify(|snap| snap.ai_configured = configured);

        info!("AI configuration updated");
        Ok(())
    }
}

/// Turn an internal failure into text shown to the user
fn user_message(prefix: &str, err: &anyhow::Error) -> String {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::Unconfigured) => CONFIGURE_KEY_MESSAGE.to_string(),
        Some(AnalysisError::FileNotReady(_)) => FILE_NOT_READY_MESSAGE.to_string(),
        _ => format!("{}: {}", prefix, err),
    }
}
