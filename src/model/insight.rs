use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightKind {
    ProductivityTip,
    DistractionAlert,
    FocusAchievement,
    TimeManagement,
    AppUsagePattern,
    BreakReminder,
    GoalProgress,
}

/// One persisted finding about a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub session_id: SessionId,
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub is_positive: bool,
    pub actionable: bool,
    pub suggestion: Option<String>,
}

/// Structured result of an insights request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
    pub productivity_score: Option<f32>,
    pub key_findings: Vec<String>,
    pub action_items: Vec<String>,
}

impl InsightReport {
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
            && self.recommendations.is_empty()
            && self.key_findings.is_empty()
            && self.action_items.is_empty()
            && self.productivity_score.is_none()
    }
}

/// Context-based summary split into display sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub summary: String,
    pub highlights: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
}

impl SummaryReport {
    /// Render the summary followed by highlight and recommendation lists
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.summary);
        out.push('\n');
        if !self.highlights.is_empty() {
            out.push_str("\nKey Highlights:\n");
            for highlight in &self.highlights {
                out.push_str(&format!("• {}\n", highlight));
            }
        }
        if !self.recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for recommendation in &self.recommendations {
                out.push_str(&format!("• {}\n", recommendation));
            }
        }
        out
    }
}
