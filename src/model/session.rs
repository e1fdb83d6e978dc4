use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

pub type SessionId = i64;

/// A single screen recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Monotonic, time-derived identifier (milliseconds since the epoch)
    pub id: SessionId,

    /// When capture started
    pub start_time: DateTime<Utc>,

    /// When capture ended, if it has
    pub end_time: Option<DateTime<Utc>>,

    /// Whether this session is currently recording
    pub is_active: bool,

    /// Latest generated summary
    pub summary: Option<String>,

    /// Local recording file
    pub video_path: Option<String>,

    pub audio_path: Option<String>,

    pub transcript: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// App identifier -> time spent in milliseconds
    #[serde(default)]
    pub app_usage: BTreeMap<String, u64>,

    pub productivity_score: Option<f32>,

    /// Remote handle of the uploaded recording
    pub remote_file_uri: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session starting now
    pub fn start(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            start_time: now,
            end_time: None,
            is_active: true,
            summary: None,
            video_path: None,
            audio_path: None,
            transcript: None,
            keywords: Vec::new(),
            app_usage: BTreeMap::new(),
            productivity_score: None,
            remote_file_uri: None,
            created_at: now,
        }
    }

    /// Mark the session finished at `end`, never earlier than its start
    pub fn finish(&mut self, end: DateTime<Utc>) {
        self.end_time = Some(end.max(self.start_time));
        self.is_active = false;
    }

    /// Elapsed time from start to end (or now while still running)
    pub fn duration(&self) -> Duration {
        self.duration_at(Utc::now())
    }

    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        end.signed_duration_since(self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration())
    }

    pub fn formatted_start_time(&self) -> String {
        self.start_time.format("%b %d, %Y %H:%M").to_string()
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Hands out strictly increasing millisecond-based session ids
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    last: AtomicI64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> SessionId {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}
