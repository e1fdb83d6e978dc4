//! Prompt construction for context-based analysis
//!
//! A prompt is a role-specific system preamble plus a user prompt that embeds
//! the serialized context block (see [`context`]).

pub mod context;
pub mod parse;

pub use context::{build_context_block, ActivityContext, ContextCaps};
pub use parse::{parse_insights, parse_summary};

/// Role the model is asked to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    General,
    ProductivityAnalysis,
    SummaryGeneration,
}

/// Fixed prompt used when summarizing a recording directly
pub const VIDEO_SUMMARY_PROMPT: &str = "Please provide a comprehensive summary of what happened in this screen recording session. Include key activities, apps used, and productivity insights.";

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub user_prompt: String,
    pub context_block: String,
}

impl PromptTemplate {
    /// Single text payload sent to the model
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system_prompt, self.user_prompt)
    }
}

pub fn build_prompt(
    question: &str,
    context: &ActivityContext,
    analysis: AnalysisType,
    custom_instructions: Option<&str>,
) -> PromptTemplate {
    let mut system_prompt = system_preamble(analysis).to_string();
    if let Some(extra) = custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        system_prompt.push_str("\n\nAdditional instructions:\n");
        system_prompt.push_str(extra);
    }

    let context_block = build_context_block(context, &ContextCaps::default());
    let user_prompt = user_prompt(question, &context_block, analysis);

    PromptTemplate {
        system_prompt,
        user_prompt,
        context_block,
    }
}

fn system_preamble(analysis: AnalysisType) -> &'static str {
    match analysis {
        AnalysisType::ProductivityAnalysis => "You are an expert productivity analyst and personal assistant. Your role is to analyze phone usage data and provide actionable insights to help users improve their productivity and digital well-being.

Key areas to focus on:
- App usage patterns and time distribution
- Focus and distraction analysis
- Time management effectiveness
- Productivity trends and recommendations
- Digital wellness insights

Always provide specific, actionable advice based on the data provided.
Be encouraging but honest about areas for improvement.",

        AnalysisType::SummaryGeneration => "You are a professional productivity coach creating comprehensive session summaries.
Analyze the provided phone usage data and create detailed, insightful summaries that help users understand their digital behavior patterns.

Include:
- Key metrics and statistics
- Notable patterns and trends
- Productivity highlights and concerns
- Specific recommendations for improvement
- Overall assessment with actionable next steps

Format your response as a structured summary with clear sections and bullet points.",

        AnalysisType::General => "You are an intelligent personal assistant that analyzes phone usage data to help users understand and improve their digital habits.

Provide helpful, accurate, and actionable responses based on the data provided.
Be conversational but informative.
Focus on productivity, digital wellness, and time management insights.",
    }
}

fn user_prompt(question: &str, context_block: &str, analysis: AnalysisType) -> String {
    match analysis {
        AnalysisType::SummaryGeneration => format!(
            "Please analyze the following phone usage session data and provide a comprehensive summary:\n\n{}\n\nGenerate a detailed summary including key metrics, patterns, insights, and recommendations.",
            context_block
        ),
        _ => format!(
            "User Question: {}\n\nContext Data:\n{}\n\nPlease provide a helpful, specific response based on this data.",
            question, context_block
        ),
    }
}
