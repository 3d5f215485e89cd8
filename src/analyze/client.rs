//! Vision API client
//!
//! Handles communication with an OpenAI-compatible chat completions
//! endpoint: one user message per request carrying the fixed report prompt
//! plus the image as a base64 data URI, with retry on rate limiting and
//! transport errors.
//!
//! The client is injected into the job runner behind [`ImageAnalyzer`]
//! rather than constructed as process-wide state, so tests can substitute a
//! double and callers control its lifetime.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::prompt::REPORT_PROMPT;
use crate::config::VisionConfig;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// The external analysis capability: one image in, one report text out.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8]) -> Result<String, AnalysisError>;
}

/// Production [`ImageAnalyzer`] backed by an OpenAI-compatible endpoint.
pub struct VisionClient {
    client: Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Send request with retry on 429 and transport errors.
    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse, AnalysisError> {
        let mut retry_delay = Duration::from_secs(2);

        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let resp = self
                .client
                .post(format!("{}/v1/chat/completions", self.config.base_url))
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await;

            match resp {
                Ok(r) if r.status().as_u16() == 429 => {
                    tracing::warn!(
                        "rate limited, retry {}/{}",
                        retry + 1,
                        self.config.max_retries
                    );
                    continue;
                }
                Ok(r) if r.status().is_success() => {
                    return r
                        .json()
                        .await
                        .map_err(|e| AnalysisError::Request(format!("invalid response: {e}")));
                }
                Ok(r) => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(AnalysisError::Api { status, body });
                }
                Err(e) => {
                    if retry == self.config.max_retries {
                        return Err(AnalysisError::Request(e.to_string()));
                    }
                    tracing::warn!(
                        "request error ({e}), retry {}/{}",
                        retry + 1,
                        self.config.max_retries
                    );
                    continue;
                }
            }
        }

        Err(AnalysisError::Request("max retries exceeded".to_string()))
    }
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn analyze(&self, image: &[u8]) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_uri(image),
                        },
                    },
                    ContentPart::Text {
                        text: REPORT_PROMPT.to_string(),
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self.send_request(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}

/// Transport-safe representation of the image bytes.
fn data_uri(image: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        detect_image_mime(image),
        STANDARD.encode(image)
    )
}

/// Detect image MIME type from magic bytes.
fn detect_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
        "image/webp"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else {
        "image/png" // Default
    }
}

// API request/response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mime_from_magic_bytes() {
        assert_eq!(detect_image_mime(&[0x89, 0x50, 0x4E, 0x47]), "image/png");
        assert_eq!(detect_image_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
        assert_eq!(detect_image_mime(b"GIF89a..."), "image/gif");
        assert_eq!(detect_image_mime(b"unknown bytes"), "image/png");
    }

    #[test]
    fn data_uri_embeds_encoded_bytes() {
        let uri = data_uri(&[0x89, 0x50, 0x4E, 0x47]);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.ends_with(&STANDARD.encode([0x89u8, 0x50, 0x4E, 0x47])));
    }

    #[test]
    fn request_payload_has_expected_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/png;base64,AAAA".to_string(),
                        },
                    },
                    ContentPart::Text {
                        text: "describe".to_string(),
                    },
                ],
            }],
            max_tokens: 256,
            temperature: 1.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "image_url");
        assert_eq!(value["messages"][0]["content"][1]["type"], "text");
    }

    #[test]
    fn response_content_may_be_absent() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
