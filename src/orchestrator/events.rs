use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::SessionOrchestrator;
use crate::capture::CaptureEvent;

/// Deliver capture completion events to the orchestrator until the channel
/// closes. Uploads started from here run detached.
pub async fn forward_capture_events(
    orchestrator: Arc<SessionOrchestrator>,
    mut events: mpsc::Receiver<CaptureEvent>,
) {
    info!("Capture event loop started");

    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Stopped {
                session_id,
                output_path,
            } => {
                orchestrator.on_capture_stopped(session_id, output_path).await;
            }
        }
    }

    info!("Capture event loop stopped");
}
