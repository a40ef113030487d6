//! Chat-completion HTTP client
//!
//! Remote failures are never raised: a non-success status or a transport
//! problem comes back as a [`Completion`] variant carrying the details.

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Marker prefixed to the raw body of a non-success response
pub const API_ERROR_MARKER: &str = "❌ LLM API error:";
/// Marker prefixed to transport and parse failures
pub const REQUEST_FAILED_MARKER: &str = "❌ Request failed:";

/// Sampling parameters for a single request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Outcome of one chat-completion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// First choice's message content
    Text(String),
    /// Non-success HTTP status with the raw response body
    ApiError { status: u16, body: String },
    /// Network error, timeout or malformed response
    RequestFailed(String),
}

impl Completion {
    pub fn is_error(&self) -> bool {
        !matches!(self, Completion::Text(_))
    }

    /// Text shown to the user in place of the result
    pub fn into_text(self) -> String {
        match self {
            Completion::Text(text) => text,
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Text(text) => f.write_str(text),
            Completion::ApiError { body, .. } => write!(f, "{} {}", API_ERROR_MARKER, body),
            Completion::RequestFailed(reason) => write!(f, "{} {}", REQUEST_FAILED_MARKER, reason),
        }
    }
}

/// Anything that can turn a single-message prompt into a completion
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, prompt: &str, params: SamplingParams) -> Completion;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client (Groq by default)
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, prompt: &str, params: SamplingParams) -> reqwest::Result<Completion> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "chat completion rejected");
            return Ok(Completion::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_completion(&body))
    }
}

fn parse_completion(body: &str) -> Completion {
    match serde_json::from_str::<ChatCompletionResponse>(body) {
        Ok(parsed) => match parsed.choices.into_iter().next() {
            Some(Choice {
                message: ResponseMessage {
                    content: Some(content),
                },
            }) => Completion::Text(content),
            _ => Completion::RequestFailed("response contained no message content".to_string()),
        },
        Err(e) => Completion::RequestFailed(format!("malformed response: {}", e)),
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn complete(&self, prompt: &str, params: SamplingParams) -> Completion {
        tracing::debug!(
            model = %self.model,
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            prompt_chars = prompt.len(),
            "sending chat completion"
        );

        self.send(prompt, params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "chat completion request failed");
            Completion::RequestFailed(e.to_string())
        })
    }
}
