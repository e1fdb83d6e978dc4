use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::model::{ActivityEvent, Session};

/// Limits applied when serializing a context block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextCaps {
    pub max_events: usize,
    pub max_screen_samples: usize,
    pub max_transcript_chars: usize,
}

impl Default for ContextCaps {
    fn default() -> Self {
        Self {
            max_events: 20,
            max_screen_samples: 5,
            max_transcript_chars: 500,
        }
    }
}

/// Everything known about a session that is handed to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityContext {
    pub session: Option<Session>,
    pub events: Vec<ActivityEvent>,
    pub screen_content: Vec<String>,
    pub audio_transcript: Option<String>,
    /// Reference time for the duration of a still-running session
    pub as_of: DateTime<Utc>,
}

impl ActivityContext {
    pub fn new(session: Option<Session>, events: Vec<ActivityEvent>) -> Self {
        let screen_content = distinct_screen_content(&events);
        let audio_transcript = session.as_ref().and_then(|s| s.transcript.clone());
        Self {
            session,
            events,
            screen_content,
            audio_transcript,
            as_of: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(None, Vec::new())
    }
}

/// Screen text samples in first-seen order, without repeats
fn distinct_screen_content(events: &[ActivityEvent]) -> Vec<String> {
    let mut seen = Vec::new();
    for content in events.iter().filter_map(|e| e.screen_content.as_ref()) {
        if !seen.contains(content) {
            seen.push(content.clone());
        }
    }
    seen
}

/// Serialize a context into the block embedded in prompts. Output depends only
/// on `context` and `caps`.
pub fn build_context_block(context: &ActivityContext, caps: &ContextCaps) -> String {
    let mut out = String::new();

    out.push_str("=== SESSION DATA ===\n");
    if let Some(session) = &context.session {
        let duration = crate::model::format_duration(session.duration_at(context.as_of));
        out.push_str(&format!("Session Duration: {}\n", duration));
        out.push_str(&format!(
            "Start Time: {}\n",
            session.formatted_start_time()
        ));
        match session.productivity_score {
            Some(score) => out.push_str(&format!("Productivity Score: {}\n", score)),
            None => out.push_str("Productivity Score: Not calculated\n"),
        }
    }

    out.push_str("\n=== APP USAGE ===\n");
    for (app, count) in app_interaction_counts(&context.events) {
        out.push_str(&format!("• {}: {} interactions\n", app, count));
    }

    out.push_str("\n=== ACTIVITY EVENTS ===\n");
    for event in context.events.iter().take(caps.max_events) {
        out.push_str(&format!(
            "• {}: {} - {}\n",
            event.timestamp.format("%H:%M:%S"),
            event.kind,
            event.app_name.as_deref().unwrap_or("Unknown")
        ));
    }

    if !context.screen_content.is_empty() {
        out.push_str("\n=== SCREEN CONTENT SAMPLE ===\n");
        for content in context.screen_content.iter().take(caps.max_screen_samples) {
            out.push_str(&format!("• {}\n", content));
        }
    }

    if let Some(transcript) = context
        .audio_transcript
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        out.push_str("\n=== AUDIO TRANSCRIPT ===\n");
        let excerpt: String = transcript.chars().take(caps.max_transcript_chars).collect();
        out.push_str(&excerpt);
        out.push('\n');
    }

    out
}

/// Interaction count per app name, highest first; ties broken by name
pub fn app_interaction_counts(events: &[ActivityEvent]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in events.iter().filter_map(|e| e.app_name.as_deref()) {
        *counts.entry(name).or_default() += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}
