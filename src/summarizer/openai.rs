use super::{user_prompt, Availability, SummaryBackend, SummaryError, MISSING_KEY_NOTICE, SYSTEM_PROMPT};
use crate::client::HttpClientConfig;
use crate::config::OpenAiConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OpenAI chat-completion backend
pub struct OpenAiBackend {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(config: &OpenAiConfig, http: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            client: http.build_client()?,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: http.timeout(),
        })
    }

    /// Whether an API key is present
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Turn a non-success response into an `Api` error, preferring the upstream message
pub(crate) fn api_error(status: u16, body: &str) -> SummaryError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|response| response.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    SummaryError::Api { status, message }
}

#[async_trait]
impl SummaryBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
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

        let prompt = user_prompt(text);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("OpenAI request: {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
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

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| SummaryError::Model(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(SummaryError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_not_configured() {
        let config = OpenAiConfig {
            api_key: Some("  ".to_string()),
            ..OpenAiConfig::default()
        };
        let backend = OpenAiBackend::new(&config, &HttpClientConfig::default()).unwrap();
        assert!(!backend.is_configured());
        assert_eq!(
            backend.availability(),
            Availability::Unavailable(MISSING_KEY_NOTICE.to_string())
        );
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            }],
            max_tokens: 150,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn test_api_error_prefers_upstream_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            api_error(401, body),
            SummaryError::Api {
                status: 401,
                message: "Incorrect API key provided".to_string()
            }
        );
        assert_eq!(
            api_error(502, "Bad Gateway\n"),
            SummaryError::Api {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }
}
