use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::model::{Insight, InsightKind, InsightReport, SessionId, SummaryReport};

const MAX_HIGHLIGHTS: usize = 5;
const MAX_RECOMMENDATIONS: usize = 3;
const SUMMARY_FALLBACK_CHARS: usize = 500;

/// Split a free-form summary into its display sections
pub fn parse_summary(content: &str) -> SummaryReport {
    let lines: Vec<&str> = content.lines().collect();

    let summary = lines
        .iter()
        .find(|line| line.contains("Summary:") || line.contains("## Summary"))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| content.chars().take(SUMMARY_FALLBACK_CHARS).collect());

    let highlights = bullet_lines(&lines).into_iter().take(MAX_HIGHLIGHTS).collect();

    SummaryReport {
        summary,
        highlights,
        concerns: Vec::new(),
        recommendations: recommendation_lines(&lines),
    }
}

fn bullet_lines(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter_map(|line| {
            line.strip_prefix('•')
                .or_else(|| line.strip_prefix('-'))
                .or_else(|| line.strip_prefix('*'))
        })
        .map(|rest| rest.trim().to_string())
        .filter(|rest| !rest.is_empty())
        .collect()
}

fn recommendation_lines(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("recommend") || lower.contains("suggest") || lower.contains("should")
        })
        .map(|line| line.trim().to_string())
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawInsightReport {
    #[serde(default)]
    productivity_score: Option<f32>,
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    action_items: Vec<String>,
    #[serde(default)]
    insights: Vec<RawInsight>,
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    #[serde(rename = "type")]
    kind: Option<InsightKind>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default = "default_true")]
    is_positive: bool,
    #[serde(default)]
    actionable: bool,
    #[serde(default)]
    suggestion: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Parse the model's insight answer. JSON is preferred; anything else is
/// mined for bullet points and recommendation lines.
pub fn parse_insights(content: &str, session_id: SessionId) -> InsightReport {
    let json = strip_code_fence(content);
    match serde_json::from_str::<RawInsightReport>(json) {
        Ok(raw) => {
            let now = Utc::now();
            let insights = raw
                .insights
                .into_iter()
                .map(|item| Insight {
                    id: uuid::Uuid::new_v4().to_string(),
                    session_id,
                    kind: item.kind.unwrap_or(InsightKind::ProductivityTip),
                    title: item.title,
                    description: item.description,
                    confidence: item.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                    timestamp: now,
                    is_positive: item.is_positive,
                    actionable: item.actionable,
                    suggestion: item.suggestion,
                })
                .collect();

            InsightReport {
                insights,
                recommendations: raw.recommendations,
                productivity_score: raw.productivity_score,
                key_findings: raw.key_findings,
                action_items: raw.action_items,
            }
        }
        Err(e) => {
            warn!("Insight response was not JSON ({}), extracting bullet points", e);
            let lines: Vec<&str> = content.lines().collect();
            InsightReport {
                key_findings: bullet_lines(&lines).into_iter().take(MAX_HIGHLIGHTS).collect(),
                recommendations: recommendation_lines(&lines),
                ..InsightReport::default()
            }
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
