//! Chat completion with bounded retries and optional prompt degradation
//!
//! [`CompletionClient::execute`] never fails: every path ends in an
//! [`Outcome`], which the caller persists.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use promptline_core::{HttpError, RetryPolicy};
use promptline_store::Response;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::openrouter::{api_error_message, rate_limit_hint};
use crate::region::{DEFAULT_SHRINK_CHARS, RegionMarkers, Shrink, shrink_prompt};

/// Default name of the token-limit field in the request body
pub const DEFAULT_TOKEN_LIMIT_FIELD: &str = "max_tokens";

/// Default value of the token-limit field
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// What to do when the API answers without usable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Resend the identical prompt
    #[default]
    Retry,
    /// Shrink the prompt's case statement region before resending
    Degrade,
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retry" | "1" => Ok(Self::Retry),
            "degrade" | "2" => Ok(Self::Degrade),
            other => Err(format!("unknown policy '{other}' (expected retry or degrade)")),
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Retry => "retry",
            Self::Degrade => "degrade",
        })
    }
}

/// Final result of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { text: String, degraded: u32 },
    /// Attempts exhausted
    RequestFailed { degraded: u32 },
    /// Region reached the degradation floor
    TooShort { degraded: u32 },
}

impl From<Outcome> for Response {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success { text, degraded } => Response::Success { text, degraded },
            Outcome::RequestFailed { degraded } => Response::RequestFailed { degraded },
            Outcome::TooShort { degraded } => Response::TooShort { degraded },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One chat completion request, independent of the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    /// Provider routing object, passed through verbatim
    pub provider: Option<Value>,
    pub token_limit_field: String,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Text of the first user message
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == "user")
            .map_or("", |m| m.content.as_str())
    }

    /// OpenAI-compatible request body.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), Value::from(self.model.as_str()));
        let messages = self
            .messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();
        body.insert("messages".into(), Value::Array(messages));
        body.insert("temperature".into(), Value::from(self.temperature));
        body.insert(self.token_limit_field.clone(), Value::from(self.max_tokens));
        if let Some(provider) = &self.provider {
            body.insert("provider".into(), provider.clone());
        }
        Value::Object(body)
    }
}

/// Why one attempt produced no content
#[derive(Debug)]
pub enum ApiError {
    /// Transport failure, timeout, non-2xx status, or non-JSON body
    Http(HttpError),
    /// 2xx JSON answer without `choices[0].message.content`
    Malformed {
        detail: String,
        retry_hint: Option<Duration>,
    },
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::Malformed { detail, .. } => write!(f, "malformed response: {detail}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Malformed { .. } => None,
        }
    }
}

impl From<HttpError> for ApiError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl ApiError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Server's suggested wait before the next attempt
    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            Self::Http(e) => e
                .retry_after()
                .or_else(|| e.body().and_then(rate_limit_hint)),
            Self::Malformed { retry_hint, .. } => *retry_hint,
        }
    }
}

/// Pull the completion text out of a 2xx JSON answer.
pub fn extract_content(body: &Value) -> Result<String, ApiError> {
    match body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(ApiError::Malformed {
            detail: api_error_message(body)
                .unwrap_or_else(|| "no choices[0].message.content".to_string()),
            retry_hint: rate_limit_hint(&body.to_string()),
        }),
    }
}

/// Seam between the retry policy and the wire.
///
/// Returns the parsed 2xx JSON body; content extraction is the caller's job.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<Value, ApiError>;
}

/// Request shape and retry behaviour shared by every worker.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub model: String,
    pub provider: Option<Value>,
    pub temperature: f64,
    pub token_limit_field: String,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
    /// Pause after every API call
    pub request_interval: Duration,
    pub markers: RegionMarkers,
    pub shrink_chars: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            provider: None,
            temperature: 0.0,
            token_limit_field: DEFAULT_TOKEN_LIMIT_FIELD.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryPolicy::default(),
            request_interval: Duration::ZERO,
            markers: RegionMarkers::default(),
            shrink_chars: DEFAULT_SHRINK_CHARS,
        }
    }
}

impl ClientSettings {
    pub fn request_for(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: self.temperature,
            provider: self.provider.clone(),
            token_limit_field: self.token_limit_field.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

/// One worker's view of the completion API: a backend plus its credential.
pub struct CompletionClient {
    backend: Arc<dyn ChatBackend>,
    api_key: String,
    settings: ClientSettings,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn ChatBackend>, api_key: String, settings: ClientSettings) -> Self {
        Self {
            backend,
            api_key,
            settings,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Send `prompt`, retrying up to `max_retries` attempts.
    ///
    /// Under [`Policy::Degrade`] a malformed answer shrinks the region before
    /// the next attempt; shrinks accumulate for the rest of this call. A
    /// prompt without a region is resent unchanged.
    pub fn execute(&self, prompt: &str, policy: Policy) -> Outcome {
        let max_attempts = self.settings.retry.max_retries;
        let mut prompt = prompt.to_string();
        let mut degraded = 0u32;

        for attempt in 1..=max_attempts {
            let request = self.settings.request_for(&prompt);
            let result = self
                .backend
                .complete(&self.api_key, &request)
                .and_then(|body| extract_content(&body));
            pause(self.settings.request_interval);

            let err = match result {
                Ok(text) => {
                    if degraded > 0 {
                        log::info!("Answered after {degraded} shrinks");
                    }
                    return Outcome::Success { text, degraded };
                }
                Err(e) => e,
            };
            log::debug!("Attempt {attempt}/{max_attempts} failed: {err}");

            if policy == Policy::Degrade && err.is_malformed() {
                match shrink_prompt(&prompt, &self.settings.markers, self.settings.shrink_chars) {
                    Shrink::Shrunk(shorter) => {
                        degraded += 1;
                        log::debug!(
                            "Shrunk case statement by {} chars (shrink #{degraded})",
                            self.settings.shrink_chars
                        );
                        prompt = shorter;
                    }
                    Shrink::Exhausted => {
                        log::warn!("Case statement too short to shrink after {degraded} shrinks");
                        return Outcome::TooShort { degraded };
                    }
                    Shrink::NoRegion => {
                        log::debug!("No case statement region, resending unchanged");
                    }
                }
            }

            if attempt < max_attempts {
                pause(self.settings.retry.delay_for(attempt, err.retry_hint()));
            }
        }

        log::warn!("API request failed after {max_attempts} attempts");
        Outcome::RequestFailed { degraded }
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}
