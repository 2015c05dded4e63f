use super::openai::api_error;
use super::{user_prompt, Availability, SummaryBackend, SummaryError, MISSING_KEY_NOTICE, SYSTEM_PROMPT};
use crate::client::HttpClientConfig;
use crate::config::GeminiConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Google Gemini `generateContent` backend
pub struct GeminiBackend {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(config: &GeminiConfig, http: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            client: http.build_client()?,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            timeout: http.timeout(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": user_prompt(text) }]
            }],
            "generationConfig": { "maxOutputTokens": self.max_output_tokens }
        })
    }
}

/// Text of the first candidate's first part
fn candidate_text(response: &Value) -> Option<String> {
    response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl SummaryBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn availability(&self) -> Availability {
        if self.is_configured() {
            Availability::Ready
        } else {
            Availability::Unavailable(MISSING_KEY_NOTICE.to_string())
        }
    }

    async fn summarize(&self, text: &str) -> std::result::Result<String, SummaryError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SummaryError::Model("API key not configured".to_string()))?;

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        debug!("Gemini request: {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| SummaryError::from_request(&e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SummaryError::from_request(&e, self.timeout))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| SummaryError::Model(format!("Failed to parse response: {e}")))?;

        candidate_text(&parsed)
            .filter(|content| !content.trim().is_empty())
            .ok_or(SummaryError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_carries_budget_and_prompt() {
        let backend = GeminiBackend::new(&GeminiConfig::default(), &HttpClientConfig::default()).unwrap();
        let body = backend.request_body("Texto.");

        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], SYSTEM_PROMPT);
        assert!(body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .ends_with("Texto."));
    }

    #[test]
    fn test_candidate_text() {
        let response = json!({"candidates": [{"content": {"parts": [{"text": "Resumen."}]}}]});
        assert_eq!(candidate_text(&response).as_deref(), Some("Resumen."));
        assert_eq!(candidate_text(&json!({"candidates": []})), None);
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let backend = GeminiBackend::new(&GeminiConfig::default(), &HttpClientConfig::default()).unwrap();
        assert!(matches!(backend.availability(), Availability::Unavailable(_)));
    }
}
