use serde::{Deserialize, Serialize};

/// Placeholder key shipped in default settings; never sent upstream
pub const DEFAULT_API_KEY: &str = "your-gemini-api-key-here";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Credential and generation parameters for the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Extra instructions appended to every system preamble
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

impl AiConfig {
    /// Whether a real credential has been saved
    pub fn is_configured(&self) -> bool {
        is_usable_key(&self.api_key)
    }
}

pub(crate) fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != DEFAULT_API_KEY
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            custom_instructions: None,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}
