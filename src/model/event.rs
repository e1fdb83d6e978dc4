use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::SessionId;

/// Kind of activity observed during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AppOpened,
    AppClosed,
    ScreenContentChanged,
    AudioDetected,
    UserInteraction,
    NotificationReceived,
    CallReceived,
    CallEnded,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            EventKind::AppOpened => "APP_OPENED",
            EventKind::AppClosed => "APP_CLOSED",
            EventKind::ScreenContentChanged => "SCREEN_CONTENT_CHANGED",
            EventKind::AudioDetected => "AUDIO_DETECTED",
            EventKind::UserInteraction => "USER_INTERACTION",
            EventKind::NotificationReceived => "NOTIFICATION_RECEIVED",
            EventKind::CallReceived => "CALL_RECEIVED",
            EventKind::CallEnded => "CALL_ENDED",
        };
        f.write_str(tag)
    }
}

/// An event belonging to exactly one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: i64,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub app_package: Option<String>,
    pub app_name: Option<String>,
    /// Text sampled from the screen when the event fired
    pub screen_content: Option<String>,
    pub audio_transcript: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ActivityEvent {
    pub fn new(session_id: SessionId, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: timestamp.timestamp_millis(),
            session_id,
            timestamp,
            kind,
            app_package: None,
            app_name: None,
            screen_content: None,
            audio_transcript: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_app(mut self, package: impl Into<String>, name: impl Into<String>) -> Self {
        self.app_package = Some(package.into());
        self.app_name = Some(name.into());
        self
    }

    pub fn with_screen_content(mut self, content: impl Into<String>) -> Self {
        self.screen_content = Some(content.into());
        self
    }
}
