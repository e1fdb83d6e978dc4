use super::state::AppState;
use crate::capture::{CaptureGrant, StopReport};
use crate::error::CaptureError;
use crate::model::{ActivityEvent, AiConfig, EventKind, InsightReport, Session, SessionId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

const DEFAULT_SESSION_LIMIT: usize = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCaptureRequest {
    /// Token issued by the host after the user consented
    pub grant: String,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub session_id: SessionId,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CaptureStateResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub kind: EventKind,
    /// Defaults to the time the request was received
    pub timestamp: Option<DateTime<Utc>>,
    pub app_package: Option<String>,
    pub app_name: Option<String>,
    pub screen_content: Option<String>,
    pub audio_transcript: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SessionRequest {
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

/// AI settings as shown to clients; the key itself is never returned
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub api_key_set: bool,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub custom_instructions: Option<String>,
}

impl From<&AiConfig> for ConfigResponse {
    fn from(config: &AiConfig) -> Self {
        Self {
            api_key_set: config.is_configured(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            custom_instructions: config.custom_instructions.clone(),
        }
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn capture_error_response(err: CaptureError) -> Response {
    let status = match err {
        CaptureError::PermissionDenied => StatusCode::FORBIDDEN,
        CaptureError::CaptureActive | CaptureError::InvalidState(_) => StatusCode::CONFLICT,
        CaptureError::SetupFailure { .. } | CaptureError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status
/// Current orchestrator snapshot
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.orchestrator.snapshot()))
}

/// POST /capture/request
/// Ask the host for a capture grant
pub async fn request_capture(State(state): State<AppState>) -> Response {
    match state.orchestrator.request_capture().await {
        Ok(()) => (
            StatusCode::OK,
            Json(CaptureStateResponse {
                status: "permission_requested".to_string(),
            }),
        )
            .into_response(),
        Err(e) => capture_error_response(e),
    }
}

/// POST /capture/denied
/// The user declined the consent dialog
pub async fn permission_denied(State(state): State<AppState>) -> Response {
    state.orchestrator.permission_denied().await;
    (
        StatusCode::OK,
        Json(CaptureStateResponse {
            status: "idle".to_string(),
        }),
    )
        .into_response()
}

/// POST /capture/start
/// Start recording with the host grant
pub async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> Response {
    info!("Starting capture");

    match state
        .orchestrator
        .start_capture(CaptureGrant::new(req.grant))
        .await
    {
        Ok(session_id) => {
            info!("Capture started for session {}", session_id);
            (
                StatusCode::OK,
                Json(StartCaptureResponse {
                    session_id,
                    status: "capturing".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start capture: {}", e);
            capture_error_response(e)
        }
    }
}

/// POST /capture/stop
/// Stop the running capture
pub async fn stop_capture(State(state): State<AppState>) -> Response {
    stop_response(state.orchestrator.stop_capture().await)
}

/// POST /capture/revoked
/// The host revoked the grant
pub async fn grant_revoked(State(state): State<AppState>) -> Response {
    stop_response(state.orchestrator.grant_revoked().await)
}

fn stop_response(result: Result<StopReport, CaptureError>) -> Response {
    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Failed to stop capture: {}", e);
            capture_error_response(e)
        }
    }
}

/// GET /sessions?limit=
/// Most recent sessions first
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_SESSION_LIMIT);
    match state.orchestrator.recent_sessions(limit).await {
        Ok(sessions) => (StatusCode::OK, Json::<Vec<Session>>(sessions)).into_response(),
        Err(e) => {
            error!("Failed to list sessions: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list sessions: {}", e),
            )
        }
    }
}

/// POST /sessions/:session_id/events
/// Record an activity event observed by the host
pub async fn record_event(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(req): Json<RecordEventRequest>,
) -> Response {
    let mut event = ActivityEvent::new(
        session_id,
        req.kind,
        req.timestamp.unwrap_or_else(Utc::now),
    );
    event.app_package = req.app_package;
    event.app_name = req.app_name;
    event.screen_content = req.screen_content;
    event.audio_transcript = req.audio_transcript;
    event.metadata = req.metadata;

    match state.orchestrator.record_event(event.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(e) => {
            error!("Failed to record event: {:#}", e);
            error_response(StatusCode::NOT_FOUND, format!("{:#}", e))
        }
    }
}

/// POST /ask
pub async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> impl IntoResponse {
    let text = state.orchestrator.ask(&req.question, req.session_id).await;
    (StatusCode::OK, Json(TextResponse { text }))
}

/// POST /summary
pub async fn summarize(
    State(state): State<AppState>,
    body: Option<Json<SessionRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let text = state.orchestrator.summarize(req.session_id).await;
    (StatusCode::OK, Json(TextResponse { text }))
}

/// POST /insights
pub async fn insights(
    State(state): State<AppState>,
    body: Option<Json<SessionRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let report: InsightReport = state.orchestrator.insights(req.session_id).await;
    (StatusCode::OK, Json(report))
}

/// GET /config
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.orchestrator.ai_config().await;
    (StatusCode::OK, Json(ConfigResponse::from(&config)))
}

/// PUT /config
pub async fn update_config(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigRequest>,
) -> Response {
    let mut config = state.orchestrator.ai_config().await;
    if let Some(api_key) = req.api_key {
        config.api_key = api_key.trim().to_string();
    }
    if let Some(model) = req.model {
        config.model = model;
    }
    if let Some(max_tokens) = req.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(temperature) = req.temperature {
        config.temperature = temperature;
    }
    if let Some(instructions) = req.custom_instructions {
        config.custom_instructions = Some(instructions).filter(|s| !s.trim().is_empty());
    }

    match state.orchestrator.save_ai_config(config.clone()).await {
        Ok(()) => (StatusCode::OK, Json(ConfigResponse::from(&config))).into_response(),
        Err(e) => {
            error!("Failed to save AI config: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save config: {}", e),
            )
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
