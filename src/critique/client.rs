//! Generative model client seam.
//!
//! Both the critique pipeline and screenshot analysis only need "prompt (and
//! optionally one inline image) in, text out", so that is the whole trait.

use crate::Result;
#[cfg(feature = "remote")]
use crate::{CritiqueConfig, Error};

/// Base64 image attached to a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(
        prompt: impl Into<String>,
        mime_type: impl Into<String>,
        base64_data: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(InlineImage {
                mime_type: mime_type.into(),
                data: base64_data.into(),
            }),
        }
    }
}

pub trait GenerativeClient: Send + Sync {
    /// Run one generation and return the model's text reply
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

impl<F> GenerativeClient for F
where
    F: Fn(&GenerateRequest) -> Result<String> + Send + Sync,
{
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self(request)
    }
}

/// Reply text used when the model returns no candidates
pub const EMPTY_REPLY: &str = "No response from Gemini.";

/// Client for the Gemini `generateContent` REST endpoint
#[cfg(feature = "remote")]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[cfg(feature = "remote")]
impl GeminiClient {
    pub fn new(config: &CritiqueConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::ConfigError("GEMINI_API_KEY is not set".into()))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[cfg(feature = "remote")]
impl GenerativeClient for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        log::debug!("POST {} ({} prompt chars)", self.url(), request.prompt.len());
        let reply: serde_json::Value = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(reply_text(&reply).unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }
}

/// JSON body of a `generateContent` call
pub fn request_body(request: &GenerateRequest) -> serde_json::Value {
    let mut parts = vec![serde_json::json!({ "text": request.prompt })];
    if let Some(img) = &request.image {
        parts.push(serde_json::json!({
            "inlineData": { "mimeType": img.mime_type, "data": img.data }
        }));
    }
    serde_json::json!({ "contents": [{ "role": "user", "parts": parts }] })
}

/// Concatenated text parts of the first candidate
pub fn reply_text(reply: &serde_json::Value) -> Option<String> {
    let parts = reply
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
