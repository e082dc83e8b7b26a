//! Blocking JSON-over-HTTP client.
//!
//! Uses async reqwest on an owned tokio runtime, but presents a sync
//! interface so worker threads can block on each call.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};

/// Default per-request timeout (connect + send + full body)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest `Retry-After` hint we accept from a server
const MAX_RETRY_AFTER_SECS: f64 = 3600.0;

/// Timeouts applied to every request made through a [`JsonClient`].
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Error types for HTTP operations
#[derive(Debug)]
pub enum HttpError {
    /// Server answered with a non-2xx status
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },
    /// No complete response within the request timeout
    Timeout(Duration),
    /// Connection, TLS, or body read failure
    Transport(String),
    /// 2xx response whose body is not JSON
    Decode(String),
    /// Client construction or request encoding failed
    Client(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, body, .. } => {
                let snippet: String = body.chars().take(200).collect();
                write!(f, "HTTP {status}: {snippet}")
            }
            Self::Timeout(t) => write!(f, "request timed out after {}s", t.as_secs()),
            Self::Transport(message) => write!(f, "HTTP error: {message}"),
            Self::Decode(message) => write!(f, "invalid JSON body: {message}"),
            Self::Client(message) => write!(f, "HTTP client error: {message}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    fn from_reqwest(e: &reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Transport(e.to_string())
        }
    }

    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided wait hint (`Retry-After`)
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Response body of a non-2xx answer
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Parse a `Retry-After` header given in seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0 && *secs <= MAX_RETRY_AFTER_SECS)
        .map(Duration::from_secs_f64)
}

/// HTTP client that posts JSON and blocks the calling thread for the answer.
///
/// Safe to share between worker threads; each call runs on the internal
/// runtime and the connection pool is reused across calls.
pub struct JsonClient {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    request_timeout: Duration,
}

impl std::fmt::Debug for JsonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl JsonClient {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("promptline-http")
            .enable_all()
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            request_timeout: config.request_timeout,
        })
    }

    /// POST `body` as JSON with optional bearer auth and parse the 2xx answer.
    ///
    /// Non-2xx answers become [`HttpError::Status`] (body kept for
    /// diagnostics); a 2xx answer that is not JSON becomes [`HttpError::Decode`].
    pub fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, HttpError> {
        let payload = serde_json::to_vec(body).map_err(|e| HttpError::Client(e.to_string()))?;
        let timeout = self.request_timeout;

        self.runtime.block_on(async {
            let mut request = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(payload);
            if let Some(token) = bearer.filter(|t| !t.is_empty()) {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }

            let response = request
                .send()
                .await
                .map_err(|e| HttpError::from_reqwest(&e, timeout))?;

            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let text = response
                .text()
                .await
                .map_err(|e| HttpError::from_reqwest(&e, timeout))?;

            if !status.is_success() {
                return Err(HttpError::Status {
                    status: status.as_u16(),
                    body: text,
                    retry_after,
                });
            }

            serde_json::from_str(&text).map_err(|e| HttpError::Decode(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn retry_after_seconds() {
        let headers = headers_with_retry_after("7");
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_fractional() {
        let headers = headers_with_retry_after("1.5");
        assert_eq!(
            parse_retry_after(&headers),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after(&headers_with_retry_after("soon")), None);
        assert_eq!(parse_retry_after(&headers_with_retry_after("-3")), None);
        assert_eq!(parse_retry_after(&headers_with_retry_after("99999")), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn status_accessors() {
        let err = HttpError::Status {
            status: 429,
            body: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(err.body(), Some("slow down"));
    }

    #[test]
    fn non_status_errors_have_no_status() {
        let err = HttpError::Timeout(Duration::from_secs(5));
        assert_eq!(err.status(), None);
        assert_eq!(err.retry_after(), None);
        assert_eq!(err.body(), None);
    }

    #[test]
    fn display_status_truncates_body() {
        let err = HttpError::Status {
            status: 500,
            body: "x".repeat(500),
            retry_after: None,
        };
        let msg = format!("{err}");
        assert!(msg.starts_with("HTTP 500: "));
        assert_eq!(msg.len(), "HTTP 500: ".len() + 200);
    }

    #[test]
    fn display_timeout() {
        let err = HttpError::Timeout(Duration::from_secs(180));
        assert_eq!(format!("{err}"), "request timed out after 180s");
    }

    #[test]
    fn client_builds_with_defaults() {
        let client = JsonClient::new(&HttpConfig::default());
        assert!(client.is_ok());
    }
}
