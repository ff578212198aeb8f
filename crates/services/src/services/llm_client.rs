//! Anthropic messages API client used for generated summaries.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited by provider")]
    RateLimited,
    #[error("provider rejected the api key")]
    Unauthorized,
    #[error("unusable response: {0}")]
    Malformed(String),
    #[error("no api key configured")]
    NotConfigured,
}

impl LlmError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Text model that answers a prompt with a JSON document.
#[async_trait]
pub trait JsonCompletion: Send + Sync {
    async fn complete_json(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<Value, LlmError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicClient {
    const TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, LlmError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::NotConfigured);
        }
        let http = Client::builder()
            .timeout(Self::TIMEOUT)
            .user_agent(concat!("diplomatic-relations/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            s if s.is_success() => {
                let parsed: MessagesResponse = response
                    .json()
                    .await
                    .map_err(|e| LlmError::Malformed(e.to_string()))?;
                parsed
                    .content
                    .into_iter()
                    .find_map(|block| match block {
                        ResponseBlock::Text { text } => Some(text),
                        ResponseBlock::Other => None,
                    })
                    .ok_or_else(|| LlmError::Malformed("no text block".into()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LlmError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(LlmError::RateLimited),
            s => Err(LlmError::Http {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl JsonCompletion for AnthropicClient {
    async fn complete_json(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<Value, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: [ChatMessage { role: "user", content: prompt }],
        };

        let text = (|| async { self.send(&body).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(2)
                    .with_jitter(),
            )
            .when(LlmError::is_transient)
            .notify(|e, wait| warn!(error = %e, wait_ms = wait.as_millis() as u64, "retrying LLM request"))
            .await?;

        let candidate = extract_json(&text)
            .ok_or_else(|| LlmError::Malformed("response did not contain a JSON object".into()))?;
        serde_json::from_str(candidate).map_err(|e| {
            error!(error = %e, length = text.len(), "LLM returned invalid JSON");
            LlmError::Malformed(e.to_string())
        })
    }
}

/// The JSON object inside a model reply, which may be fenced or surrounded by prose.
pub fn extract_json(text: &str) -> Option<&str> {
    let body = match text.find("```") {
        Some(fence) => {
            let after = &text[fence + 3..];
            let after = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
            after.find("```").map_or(after, |end| &after[..end])
        }
        None => text,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| body[start..=end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_bare_and_with_prose() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
        assert_eq!(
            extract_json(r#"Here is the summary: {"a": {"b": 2}} hope it helps"#),
            Some(r#"{"a": {"b": 2}}"#)
        );
    }

    #[test]
    fn test_extract_json_fenced() {
        let reply = "```json\n{\"a\": 1}\n```\ntrailing {noise}";
        assert_eq!(extract_json(reply), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let err = AnthropicClient::new(SecretString::from("  ".to_string()), None).unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[test]
    fn test_transient_errors() {
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::Http { status: 502, body: String::new() }.is_transient());
        assert!(!LlmError::Http { status: 400, body: String::new() }.is_transient());
        assert!(!LlmError::Unauthorized.is_transient());
    }
}
