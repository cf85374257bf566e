//! Generative-model integration.
//!
//! The [`GenerativeModel`] trait is the seam the classifier and reply
//! generator are written against; [`GeminiClient`] is the production
//! implementation, a thin reqwest wrapper over the Gemini REST endpoint.
//! The endpoint returns free text with no structured-output guarantee, so
//! callers parse defensively.

pub mod classifier;
pub mod replies;

pub use classifier::EmailClassifier;
pub use replies::{ReplyGenerator, ReplyVariants};

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::error::LlmError;

/// A generative model that maps (system instruction, user prompt) to text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Request timeout for model calls. Single attempt, no retry.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini API client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, model: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        tracing::info!(model = %model, "Using Gemini");
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model);
        let body = json!({
            "system_instruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                reason: format!("status {status}: {detail}"),
            });
        }

        let payload: serde_json::Value = response.json().await?;
        extract_text(&payload)
    }
}

/// Pull the concatenated text parts out of a generateContent response.
fn extract_text(payload: &serde_json::Value) -> Result<String, LlmError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| LlmError::InvalidResponse {
            reason: "no candidates in response".into(),
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(LlmError::InvalidResponse {
            reason: "candidate contained no text parts".into(),
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_from_candidate_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Inter" }, { "text": "ested" }] }
            }]
        });
        assert_eq!(extract_text(&payload).unwrap(), "Interested");
    }

    #[test]
    fn extract_text_rejects_empty_response() {
        assert!(extract_text(&json!({})).is_err());
        assert!(extract_text(&json!({ "candidates": [] })).is_err());
        let no_text = json!({ "candidates": [{ "content": { "parts": [] } }] });
        assert!(extract_text(&no_text).is_err());
    }
}
