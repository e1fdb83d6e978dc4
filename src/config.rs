use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::AiConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Directory recordings are written to
    pub output_dir: PathBuf,
    /// Interval of the liveness log while a recorder is running
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

fn default_monitor_interval() -> u64 {
    30
}

/// Endpoints and transport budgets for the Gemini REST API
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub base_url: String,
    pub upload_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// End-to-end ceiling for a single call
    pub call_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            upload_url: "https://generativelanguage.googleapis.com/upload/v1beta/files".to_string(),
            connect_timeout_secs: 60,
            read_timeout_secs: 180,
            call_timeout_secs: 300,
            poll_interval_secs: 10,
            max_poll_attempts: 30,
        }
    }
}

impl GeminiConfig {
    /// Point both endpoints at a single root, e.g. a local mock server
    pub fn with_root(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            base_url: format!("{}/v1beta", root),
            upload_url: format!("{}/upload/v1beta/files", root),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SCREEN_INSIGHT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
