use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::OracleError;

/// Anything that turns a prompt into a reply.
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Ask for `response_format: json_object`. Not every compatible endpoint supports it.
    pub json_mode: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-3.5-turbo".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
            max_tokens: 200,
            timeout: Duration::from_secs(30),
            json_mode: false,
        }
    }
}

/// OpenAI-compatible chat completions client. A 429 moves on to the next configured key.
pub struct OpenAiOracle {
    client: Client,
    config: OracleConfig,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.api_keys.is_empty() {
            return Err(OracleError::MissingKey);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| OracleError::Request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OracleClient for OpenAiOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        let mut last_error: Option<OracleError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let body = ChatCompletionRequest {
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                response_format: self.config.json_mode.then(|| ResponseFormat {
                    r#type: "json_object".to_string(),
                }),
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
            };

            let response = match self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    last_error = Some(OracleError::Request(err.to_string()));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 && index + 1 < self.config.api_keys.len() {
                    let friendly = rate_limit_message(&text);
                    warn!(
                        target: "decision-oracle",
                        message = %friendly,
                        attempt = index + 1,
                        remaining = self.config.api_keys.len() - index - 1,
                        "oracle rate limited; switching API key"
                    );
                    last_error = Some(OracleError::RateLimited(friendly));
                    continue;
                }
                return Err(OracleError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let response: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|err| OracleError::InvalidResponse(err.to_string()))?;

            if let Some(usage) = &response.usage {
                debug!(
                    target: "decision-oracle",
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "oracle usage"
                );
            }

            return response
                .choices
                .first()
                .and_then(|choice| choice.message.content.as_text())
                .ok_or_else(|| OracleError::InvalidResponse("response missing content".into()));
        }

        Err(last_error.unwrap_or_else(|| {
            OracleError::Request("oracle request exhausted all API keys".to_string())
        }))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_ref())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorMessage {
    message: Option<String>,
}

fn rate_limit_message(raw: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<OpenAiErrorEnvelope>(raw) {
        if let Some(message) = envelope.error.message {
            return format!("oracle rate limit exceeded: {}", message.trim());
        }
    }
    "oracle rate limit exceeded; retry later".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_parts_are_joined() {
        let content: ChatCompletionContent =
            serde_json::from_str(r#"[{"type":"text","text":"a"},{"type":"text","text":"b"}]"#)
                .unwrap();
        assert_eq!(content.as_text().as_deref(), Some("a\nb"));
    }

    #[test]
    fn rate_limit_message_prefers_server_text() {
        let raw = r#"{"error":{"message":" Slow down ","type":"requests"}}"#;
        assert_eq!(rate_limit_message(raw), "oracle rate limit exceeded: Slow down");
        assert_eq!(
            rate_limit_message("<html>"),
            "oracle rate limit exceeded; retry later"
        );
    }

    #[test]
    fn refuses_to_build_without_keys() {
        assert!(matches!(
            OpenAiOracle::new(OracleConfig::default()),
            Err(OracleError::MissingKey)
        ));
    }
}
