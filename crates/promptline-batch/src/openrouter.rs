//! OpenRouter (OpenAI-compatible) chat completion backend

use std::time::Duration;

use promptline_core::{HttpConfig, HttpError, JsonClient};
use serde_json::Value;

use crate::client::{ApiError, ChatBackend, ChatRequest};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Longest wait a body hint may ask for
const MAX_HINT_SECS: f64 = 3600.0;

/// Posts to `{base_url}/chat/completions` with bearer auth.
#[derive(Debug)]
pub struct OpenRouterBackend {
    http: JsonClient,
    endpoint: String,
}

impl OpenRouterBackend {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            http: JsonClient::new(http)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChatBackend for OpenRouterBackend {
    fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<Value, ApiError> {
        let body = self
            .http
            .post_json(&self.endpoint, Some(api_key), &request.to_body())?;
        if let Some(message) = api_error_message(&body) {
            log::debug!("API reported error with 2xx status: {message}");
        }
        Ok(body)
    }
}

/// `error.message` of an OpenAI-style error body, with the upstream
/// provider's raw message appended when present.
pub(crate) fn api_error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    match error.pointer("/metadata/raw").and_then(Value::as_str) {
        Some(raw) => Some(format!("{message} ({raw})")),
        None => Some(message.to_string()),
    }
}

/// Wait suggested by a "Try again in N seconds" phrase anywhere in `text`.
pub(crate) fn rate_limit_hint(text: &str) -> Option<Duration> {
    const PHRASE: &str = "try again in ";
    let lower = text.to_ascii_lowercase();
    let start = lower.find(PHRASE)? + PHRASE.len();
    let number: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0 && *secs <= MAX_HINT_SECS)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_joins_base_url() {
        let backend =
            OpenRouterBackend::new("https://example.test/api/v1/", &HttpConfig::default()).unwrap();
        assert_eq!(
            backend.endpoint(),
            "https://example.test/api/v1/chat/completions"
        );
    }

    #[test]
    fn hint_from_provider_message() {
        let body = json!({"error": {"code": 429, "message": "Provider returned error",
            "metadata": {"raw": "Rate limit reached. Try again in 12 seconds."}}});
        assert_eq!(
            rate_limit_hint(&body.to_string()),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn hint_accepts_fractions_and_rejects_nonsense() {
        assert_eq!(
            rate_limit_hint("try again in 1.5s"),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(rate_limit_hint("Try again in a moment"), None);
        assert_eq!(rate_limit_hint("Try again in 0 seconds"), None);
        assert_eq!(rate_limit_hint("Try again in 86400 seconds"), None);
        assert_eq!(rate_limit_hint("all good"), None);
    }

    #[test]
    fn error_message_includes_raw() {
        let body = json!({"error": {"message": "Provider returned error",
            "metadata": {"raw": "overloaded"}}});
        assert_eq!(
            api_error_message(&body).as_deref(),
            Some("Provider returned error (overloaded)")
        );
        assert_eq!(api_error_message(&json!({"choices": []})), None);
    }

    #[test]
    fn http_status_error_surfaces_body_hint() {
        let err = ApiError::Http(HttpError::Status {
            status: 429,
            body: r#"{"error":{"message":"Try again in 3 seconds"}}"#.into(),
            retry_after: None,
        });
        assert_eq!(err.retry_hint(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn retry_after_header_wins_over_body() {
        let err = ApiError::Http(HttpError::Status {
            status: 429,
            body: "Try again in 3 seconds".into(),
            retry_after: Some(Duration::from_secs(9)),
        });
        assert_eq!(err.retry_hint(), Some(Duration::from_secs(9)));
    }
}
