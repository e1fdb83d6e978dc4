// Integration tests for the session orchestrator
//
// The orchestrator runs against a MemoryStore, the fake capture platform and
// a wiremock Gemini server.

mod support;

use anyhow::Result;
use chrono::Utc;
use screen_insight::capture::{CaptureEvent, CaptureGrant, CaptureSettings, CaptureState, VideoProfile};
use screen_insight::{
    forward_capture_events, ActivityEvent, AiConfig, CaptureError, EventKind, MemoryStore,
    SessionOrchestrator, Store, UploadedFile,
};
use std::sync::Arc;
use std::time::Duration;
use support::{ai_config, inference_client, FakePlatform, Failures};
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    orchestrator: Arc<SessionOrchestrator>,
    events: mpsc::Receiver<CaptureEvent>,
    store: Arc<MemoryStore>,
    platform: Arc<FakePlatform>,
    server: MockServer,
    _dir: TempDir,
}

async fn harness(failures: Failures, config: AiConfig) -> Result<Harness> {
    let dir = TempDir::new()?;
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let platform = FakePlatform::new(failures);

    let settings = CaptureSettings {
        output_dir: dir.path().to_path_buf(),
        profile: VideoProfile::default(),
        monitor_interval: Duration::from_millis(10),
    };

    let (orchestrator, events) = SessionOrchestrator::new(
        store.clone(),
        inference_client(&server),
        platform.clone(),
        settings,
        config,
    );

    Ok(Harness {
        orchestrator: Arc::new(orchestrator),
        events,
        store,
        platform,
        server,
        _dir: dir,
    })
}

#[tokio::test]
async fn test_concurrent_starts_leave_one_active_session() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    h.orchestrator.request_capture().await?;

    let (first, second) = tokio::join!(
        h.orchestrator.start_capture(CaptureGrant::new("a")),
        h.orchestrator.start_capture(CaptureGrant::new("b")),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(CaptureError::CaptureActive))));

    let sessions = h.store.recent_sessions(10).await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions.iter().filter(|s| s.is_active).count(), 1);

    // A new request while capturing is rejected too
    assert!(matches!(
        h.orchestrator.request_capture().await,
        Err(CaptureError::CaptureActive)
    ));

    Ok(())
}

#[tokio::test]
async fn test_permission_denied_creates_no_record() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;

    h.orchestrator.request_capture().await?;
    assert_eq!(
        h.orchestrator.snapshot().capture_state,
        CaptureState::PermissionRequested
    );

    h.orchestrator.permission_denied().await;

    assert_eq!(h.orchestrator.snapshot().capture_state, CaptureState::Idle);
    assert!(h.store.recent_sessions(10).await?.is_empty());
    assert!(h.orchestrator.current_session().await.is_none());
    assert!(h.platform.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_start_without_request_is_rejected() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;

    let err = h
        .orchestrator
        .start_capture(CaptureGrant::new("grant"))
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::InvalidState(_)));
    assert!(h.store.recent_sessions(10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_setup_failure_closes_session_record() -> Result<()> {
    let h = harness(
        Failures {
            projection: true,
            ..Failures::default()
        },
        ai_config(),
    )
    .await?;

    h.orchestrator.request_capture().await?;
    let err = h
        .orchestrator
        .start_capture(CaptureGrant::new("grant"))
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::SetupFailure { .. }));

    let sessions = h.store.recent_sessions(10).await?;
    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].is_active);
    assert!(sessions[0].end_time.is_some());
    assert!(h.store.active_session().await?.is_none());

    assert!(matches!(
        h.orchestrator.snapshot().capture_state,
        CaptureState::Error { .. }
    ));

    // The failed capture does not block the next attempt
    h.orchestrator.request_capture().await?;

    Ok(())
}

#[tokio::test]
async fn test_stop_closes_session_and_uploads_recording() -> Result<()> {
    let mut h = harness(Failures::default(), ai_config()).await?;
    support::mount_upload(&h.server, "rec1").await;

    h.orchestrator.request_capture().await?;
    let session_id = h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;
    assert!(h.orchestrator.snapshot().is_recording());

    let report = h.orchestrator.stop_capture().await?;
    let output = report.output_path.clone().unwrap();
    assert_eq!(h.orchestrator.snapshot().capture_state, CaptureState::Stopped);

    let CaptureEvent::Stopped {
        session_id: stopped_id,
        output_path,
    } = h.events.recv().await.unwrap();
    assert_eq!(stopped_id, session_id);
    assert_eq!(output_path.as_ref(), Some(&output));

    let upload = h
        .orchestrator
        .on_capture_stopped(stopped_id, output_path)
        .await
        .expect("upload task");
    upload.await?;

    let session = h.store.get_session(session_id).await?.unwrap();
    assert!(!session.is_active);
    assert!(session.end_time.unwrap() >= session.start_time);
    assert_eq!(session.video_path.as_deref(), Some(output.to_str().unwrap()));
    assert_eq!(
        session.remote_file_uri,
        Some(support::file_uri(&h.server, "rec1"))
    );

    let uploads = h.store.recent_uploaded_files(10).await?;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_uri, support::file_uri(&h.server, "rec1"));
    assert_eq!(uploads[0].file_size, b"fake mp4 data".len() as u64);

    let current = h.orchestrator.current_session().await.unwrap();
    assert_eq!(current.remote_file_uri, session.remote_file_uri);
    assert_eq!(
        h.orchestrator.snapshot().message.as_deref(),
        Some("Screen recording uploaded successfully!")
    );

    Ok(())
}

#[tokio::test]
async fn test_stopping_is_published_during_teardown() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    h.orchestrator.request_capture().await?;
    h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;

    let observed = Arc::new(std::sync::Mutex::new(None));
    let seen = observed.clone();
    let updates = h.orchestrator.subscribe();
    h.platform.on_recorder_stop(move || {
        *seen.lock().unwrap() = Some(updates.borrow().capture_state.clone());
    });

    h.orchestrator.stop_capture().await?;

    assert_eq!(*observed.lock().unwrap(), Some(CaptureState::Stopping));
    assert_eq!(h.orchestrator.snapshot().capture_state, CaptureState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_late_stop_event_keeps_newer_session_current() -> Result<()> {
    let mut h = harness(Failures::default(), ai_config()).await?;

    h.orchestrator.request_capture().await?;
    let first = h.orchestrator.start_capture(CaptureGrant::new("a")).await?;
    h.orchestrator.stop_capture().await?;

    // Second capture starts before the first stop event is handled
    h.orchestrator.request_capture().await?;
    let second = h.orchestrator.start_capture(CaptureGrant::new("b")).await?;
    assert_ne!(first, second);

    let CaptureEvent::Stopped {
        session_id,
        output_path,
    } = h.events.recv().await.unwrap();
    assert_eq!(session_id, first);

    if let Some(upload) = h.orchestrator.on_capture_stopped(session_id, output_path).await {
        upload.await?;
    }

    let current = h.orchestrator.current_session().await.unwrap();
    assert_eq!(current.id, second);
    assert!(current.is_active);

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.current_session.map(|s| s.id), Some(second));
    assert_eq!(snapshot.capture_state, CaptureState::Capturing);

    let closed = h.store.get_session(first).await?.unwrap();
    assert!(!closed.is_active);
    assert!(closed.video_path.is_some());

    Ok(())
}

#[tokio::test]
async fn test_event_loop_forwards_stop_to_orchestrator() -> Result<()> {
    let h = harness(Failures::default(), AiConfig::default()).await?;
    let orchestrator = h.orchestrator.clone();
    let mut updates = orchestrator.subscribe();
    tokio::spawn(forward_capture_events(orchestrator.clone(), h.events));

    orchestrator.request_capture().await?;
    let session_id = orchestrator.start_capture(CaptureGrant::new("grant")).await?;
    orchestrator.grant_revoked().await?;

    // Wait until the loop closed the session; the upload then fails on the
    // missing key and reports it
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            updates.changed().await.unwrap();
            let message = updates.borrow().message.clone();
            if message.is_some_and(|m| m.starts_with("Failed to upload")) {
                break;
            }
        }
    })
    .await?;

    let session = h.store.get_session(session_id).await?.unwrap();
    assert!(!session.is_active);
    assert!(session.video_path.is_some());
    assert!(session.remote_file_uri.is_none());

    Ok(())
}

#[tokio::test]
async fn test_stop_without_recording_skips_upload() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;

    h.orchestrator.request_capture().await?;
    let session_id = h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;

    assert!(h
        .orchestrator
        .on_capture_stopped(session_id, None)
        .await
        .is_none());

    let session = h.store.get_session(session_id).await?.unwrap();
    assert!(!session.is_active);
    assert!(session.video_path.is_none());
    assert!(h.server.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_ask_without_key_explains_configuration() -> Result<()> {
    let h = harness(Failures::default(), AiConfig::default()).await?;

    let answer = h.orchestrator.ask("What did I do?", None).await;

    assert!(answer.contains("configure your Gemini API key"));
    assert!(h.server.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_ask_prefers_recent_uploads() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    support::mount_file_state(&h.server, "old", "ACTIVE").await;
    support::mount_generate(&h.server, "You were reviewing code.").await;

    h.store
        .insert_uploaded_file(&UploadedFile {
            file_uri: support::file_uri(&h.server, "old"),
            local_path: "/tmp/old.mp4".to_string(),
            upload_time: Utc::now(),
            file_size: 42,
            mime_type: "video/mp4".to_string(),
        })
        .await?;

    let answer = h.orchestrator.ask("What did I do?", None).await;
    assert_eq!(answer, "You were reviewing code.");

    let requests = h.server.received_requests().await.unwrap();
    let generate = requests
        .iter()
        .find(|r| r.url.path() == support::generate_path())
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&generate.body)?;
    assert_eq!(
        body["contents"][0]["parts"][0]["fileData"]["fileUri"],
        support::file_uri(&h.server, "old").as_str()
    );

    Ok(())
}

#[tokio::test]
async fn test_ask_reports_file_not_ready() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    support::mount_file_state(&h.server, "stuck", "FAILED").await;

    h.store
        .insert_uploaded_file(&UploadedFile {
            file_uri: support::file_uri(&h.server, "stuck"),
            local_path: "/tmp/stuck.mp4".to_string(),
            upload_time: Utc::now(),
            file_size: 42,
            mime_type: "video/mp4".to_string(),
        })
        .await?;

    let answer = h.orchestrator.ask("What did I do?", None).await;
    assert!(answer.contains("not ready for analysis"));

    Ok(())
}

#[tokio::test]
async fn test_summarize_without_session() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;

    assert_eq!(
        h.orchestrator.summarize(None).await,
        "No active session found to summarize."
    );
    assert_eq!(
        h.orchestrator.summarize(Some(12345)).await,
        "No active session found to summarize."
    );

    Ok(())
}

#[tokio::test]
async fn test_summarize_from_context_persists_summary() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    support::mount_generate(
        &h.server,
        "## Summary: Focused editing session\n• Wrote the parser\n• Reviewed tests",
    )
    .await;

    h.orchestrator.request_capture().await?;
    let session_id = h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;
    h.orchestrator
        .record_event(
            ActivityEvent::new(session_id, EventKind::AppOpened, Utc::now())
                .with_app("com.example.editor", "Editor"),
        )
        .await?;
    // Closed without a recording file, so the summary comes from context
    h.orchestrator.on_capture_stopped(session_id, None).await;

    let summary = h.orchestrator.summarize(None).await;
    assert!(summary.contains("Focused editing session"));

    let session = h.store.get_session(session_id).await?.unwrap();
    assert_eq!(
        session.summary.as_deref(),
        Some("## Summary: Focused editing session")
    );

    Ok(())
}

#[tokio::test]
async fn test_summarize_uses_existing_handle_for_local_video() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    support::mount_file_state(&h.server, "vid", "ACTIVE").await;
    support::mount_generate(&h.server, "A comprehensive summary.").await;

    h.orchestrator.request_capture().await?;
    let session_id = h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;
    let report = h.orchestrator.stop_capture().await?;

    let mut session = h.store.get_session(session_id).await?.unwrap();
    session.finish(Utc::now());
    session.video_path = report
        .output_path
        .map(|p| p.to_string_lossy().into_owned());
    session.remote_file_uri = Some(support::file_uri(&h.server, "vid"));
    h.store.update_session(&session).await?;

    let summary = h.orchestrator.summarize(Some(session_id)).await;
    assert_eq!(summary, "A comprehensive summary.");

    // No upload was needed
    let requests = h.server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| !r.url.path().starts_with("/upload")));

    let session = h.store.get_session(session_id).await?.unwrap();
    assert_eq!(session.summary.as_deref(), Some("A comprehensive summary."));

    Ok(())
}

#[tokio::test]
async fn test_insights_failure_yields_empty_report() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    Mock::given(method("POST"))
        .and(path(support::generate_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    h.orchestrator.request_capture().await?;
    let session_id = h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;

    let report = h.orchestrator.insights(Some(session_id)).await;
    assert!(report.is_empty());
    assert!(h.store.insights_for_session(session_id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_insights_are_persisted() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;
    let answer = serde_json::json!({
        "productivity_score": 70,
        "insights": [
            { "type": "BREAK_REMINDER", "title": "Take a break", "description": "Two hours straight" }
        ]
    })
    .to_string();
    support::mount_generate(&h.server, &answer).await;

    h.orchestrator.request_capture().await?;
    let session_id = h.orchestrator.start_capture(CaptureGrant::new("grant")).await?;

    let report = h.orchestrator.insights(None).await;
    assert_eq!(report.insights.len(), 1);

    let stored = h.store.insights_for_session(session_id).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Take a break");

    let session = h.store.get_session(session_id).await?.unwrap();
    assert_eq!(session.productivity_score, Some(70.0));

    Ok(())
}

#[tokio::test]
async fn test_ai_config_loaded_from_store_then_saved() -> Result<()> {
    let h = harness(Failures::default(), AiConfig::default()).await?;

    let stored = AiConfig {
        model: "gemini-2.5-pro".to_string(),
        ..ai_config()
    };
    h.store.save_ai_config(&stored).await?;

    assert_eq!(h.orchestrator.ai_config().await, stored);
    assert!(h.orchestrator.snapshot().ai_configured);

    let cleared = AiConfig::default();
    h.orchestrator.save_ai_config(cleared.clone()).await?;
    assert_eq!(h.orchestrator.ai_config().await, cleared);
    assert_eq!(h.store.load_ai_config().await?, Some(cleared));
    assert!(!h.orchestrator.snapshot().ai_configured);

    Ok(())
}

#[tokio::test]
async fn test_recording_events_for_unknown_session_fails() -> Result<()> {
    let h = harness(Failures::default(), ai_config()).await?;

    let result = h
        .orchestrator
        .record_event(ActivityEvent::new(999, EventKind::UserInteraction, Utc::now()))
        .await;

    assert!(result.is_err());

    Ok(())
}
