use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CallRequest;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Failure of a single attempt against the external model
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream answered with a non-success status; the body carries vendor detail
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Connection or timeout failure before a response arrived
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("{0}")]
    Other(String),
}

/// One attempt at the external model: prompt in, raw text out
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn generate(&self, request: &CallRequest) -> Result<String, TransportError>;
}

/// Configuration for the Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key (from GEMINI_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "gemini-2.5-flash")
    pub model: String,
    /// API root, overridable for proxies
    pub api_base: String,
}

impl GeminiConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base) = std::env::var("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

/// Gemini `generateContent` transport
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ModelTransport for GeminiClient {
    async fn generate(&self, request: &CallRequest) -> Result<String, TransportError> {
        let body = GeminiRequest::from_call(request);

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Other(format!("Failed to parse Gemini API response: {}", e)))?;

        response
            .text()
            .ok_or_else(|| TransportError::Other("No text content in response".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GeminiRequest {
    fn from_call(request: &CallRequest) -> Self {
        let mut parts = vec![Part::Text {
            text: request.prompt().to_string(),
        }];
        if let Some(attachment) = request.attachment() {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: attachment.mime_type.clone(),
                    data: BASE64.encode(&attachment.data),
                },
            });
        }

        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: request.expect_json().then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GeminiResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Failures on the wire, including a connection dropped mid-request, are
/// reported as `Connection` so they are retried
fn send_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Other(format!("Failed to send request to Gemini API: {}", e))
    }
}
