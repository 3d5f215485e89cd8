//! Vision API configuration
//!
//! Credentials come from the environment (a `.env` file is loaded by the
//! binary at startup); everything else has defaults that can be overridden
//! per field before constructing the client.

use std::env;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
}

/// Settings for the OpenAI-compatible vision endpoint.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout; the one guard against an indefinite hang in the
    /// external service.
    pub timeout_secs: u64,
    /// Retries on 429 and transport errors, with exponential backoff.
    pub max_retries: u32,
}

impl VisionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 1.0,
            max_tokens: 1024,
            timeout_secs: 90,
            max_retries: 3,
        }
    }

    /// Read configuration from the environment.
    ///
    /// `OPENAI_API_KEY` is required; `OPENAI_BASE_URL` and `OPENAI_MODEL`
    /// override the defaults when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }
        if let Ok(model) = env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }
}
