use tracing::{debug, error, info};

use super::client::{GeminiHttp, API_KEY_HEADER};
use super::messages::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
use super::upload::{FileUploader, PollPolicy};
use crate::config::GeminiConfig;
use crate::error::AnalysisError;
use crate::model::{AiConfig, InsightReport, SessionId, SummaryReport};
use crate::prompt::{self, ActivityContext, AnalysisType};

/// Uploaded recordings are always referenced as MP4
const ASSUMED_MIME_TYPE: &str = "video/mp4";

const INSIGHT_JSON_INSTRUCTIONS: &str = "Respond with a single JSON object with the fields: \"productivity_score\" (number 0-100 or null), \"key_findings\" (array of strings), \"recommendations\" (array of strings), \"action_items\" (array of strings) and \"insights\" (array of objects with \"type\" one of PRODUCTIVITY_TIP, DISTRACTION_ALERT, FOCUS_ACHIEVEMENT, TIME_MANAGEMENT, APP_USAGE_PATTERN, BREAK_REMINDER, GOAL_PROGRESS, plus \"title\", \"description\", \"confidence\" (0.0-1.0), \"is_positive\", \"actionable\", \"suggestion\").";

/// Issues generateContent requests against uploaded files or text context
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: GeminiHttp,
    uploader: FileUploader,
}

impl InferenceClient {
    pub fn new(http: GeminiHttp, uploader: FileUploader) -> Self {
        Self { http, uploader }
    }

    /// Client and uploader sharing one connection pool
    pub fn from_config(config: &GeminiConfig) -> anyhow::Result<Self> {
        let http = GeminiHttp::new(config)?;
        let uploader = FileUploader::new(http.clone(), PollPolicy::from(config));
        Ok(Self::new(http, uploader))
    }

    pub fn uploader(&self) -> &FileUploader {
        &self.uploader
    }

    /// Ask `prompt` about one or more uploaded recordings. Handles are checked
    /// in order and the first one that never becomes active ends the call.
    pub async fn analyze(
        &self,
        handles: &[String],
        prompt: &str,
        config: &AiConfig,
    ) -> Result<String, AnalysisError> {
        if !config.is_configured() {
            return Err(AnalysisError::Unconfigured);
        }

        info!("Analyzing {} file(s) with {}", handles.len(), config.model);

        for handle in handles {
            if !self.uploader.wait_until_active(handle, &config.api_key).await {
                return Err(AnalysisError::FileNotReady(handle.clone()));
            }
        }

        let mut parts: Vec<Part> = handles
            .iter()
            .map(|handle| Part::file(ASSUMED_MIME_TYPE, handle))
            .collect();
        parts.push(Part::text(prompt));

        self.generate(parts, config, None).await
    }

    /// Answer a question from the serialized session context alone
    pub async fn ask(
        &self,
        question: &str,
        context: &ActivityContext,
        config: &AiConfig,
    ) -> Result<String, AnalysisError> {
        let prompt = prompt::build_prompt(
            question,
            context,
            AnalysisType::General,
            config.custom_instructions.as_deref(),
        );
        self.generate_text(prompt.combined(), config, None).await
    }

    pub async fn generate_summary(
        &self,
        context: &ActivityContext,
        config: &AiConfig,
    ) -> Result<SummaryReport, AnalysisError> {
        let prompt = prompt::build_prompt(
            "Generate a comprehensive summary",
            context,
            AnalysisType::SummaryGeneration,
            config.custom_instructions.as_deref(),
        );
        let text = self.generate_text(prompt.combined(), config, None).await?;
        Ok(prompt::parse_summary(&text))
    }

    pub async fn generate_insights(
        &self,
        session_id: SessionId,
        context: &ActivityContext,
        config: &AiConfig,
    ) -> Result<InsightReport, AnalysisError> {
        let prompt = prompt::build_prompt(
            "Analyze this session for productivity insights",
            context,
            AnalysisType::ProductivityAnalysis,
            config.custom_instructions.as_deref(),
        );
        let text = format!("{}\n\n{}", prompt.combined(), INSIGHT_JSON_INSTRUCTIONS);
        let answer = self
            .generate_text(text, config, Some("application/json".to_string()))
            .await?;
        Ok(prompt::parse_insights(&answer, session_id))
    }

    async fn generate_text(
        &self,
        text: String,
        config: &AiConfig,
        response_mime_type: Option<String>,
    ) -> Result<String, AnalysisError> {
        if !config.is_configured() {
            return Err(AnalysisError::Unconfigured);
        }

        let generation = GenerationConfig {
            max_output_tokens: config.max_tokens,
            temperature: config.temperature,
            top_k: 40,
            top_p: 0.95,
            response_mime_type,
        };
        self.generate(vec![Part::text(text)], config, Some(generation))
            .await
    }

    async fn generate(
        &self,
        parts: Vec<Part>,
        config: &AiConfig,
        generation_config: Option<GenerationConfig>,
    ) -> Result<String, AnalysisError> {
        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
            model: config.model.clone(),
            generation_config,
        };

        let builder = self
            .http
            .client()
            .post(self.http.generate_url(&config.model))
            .header(API_KEY_HEADER, &config.api_key)
            .json(&request);

        let response = self.http.send_with_connect_retry(builder).await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("generateContent failed: {} {}", status, message);
            return Err(AnalysisError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        debug!("generateContent response: {}", body);

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Unreadable generateContent response: {}", e);
            AnalysisError::EmptyResponse
        })?;

        parsed
            .first_text()
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or(AnalysisError::EmptyResponse)
    }
}
