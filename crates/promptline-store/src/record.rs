//! Persisted outcome of one work item

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::{IdentityKey, WorkItem, text_or_number};

/// Generic failure after the client ran out of attempts
pub const REQUEST_FAILED: &str = "API Request failed";

/// Prompt region could not be shortened any further
pub const TOO_SHORT: &str = "Error: statement too short to shrink further";

/// Older spelling of [`TOO_SHORT`], still found in existing result files
pub const LEGACY_TOO_SHORT: &str = "Error: 案情陈述内容过短，无法继续缩减。";

/// Placeholder for a record awaiting its next attempt
pub const NOT_PROCESSED: &str = "Not processed yet";

const SKIPPED_PREFIX: &str = "Skipping after ";
const SKIPPED_SUFFIX: &str = " consecutive fails";

/// What happened to an item, persisted as a `[text, degrade_count]` pair.
///
/// `degraded` counts how many times the prompt region was shrunk before the
/// outcome was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawResponse", into = "(String, u32)")]
pub enum Response {
    Success { text: String, degraded: u32 },
    RequestFailed { degraded: u32 },
    TooShort { degraded: u32 },
    /// Fail-count cap reached; never attempted again
    Skipped { after: u32 },
    Pending,
}

impl Response {
    /// Terminal outcomes are never reprocessed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::TooShort { .. } | Self::Skipped { .. }
        )
    }

    pub fn is_request_failed(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }

    pub fn degraded(&self) -> u32 {
        match self {
            Self::Success { degraded, .. }
            | Self::RequestFailed { degraded }
            | Self::TooShort { degraded } => *degraded,
            Self::Skipped { .. } | Self::Pending => 0,
        }
    }

    /// First element of the persisted pair
    pub fn text(&self) -> String {
        match self {
            Self::Success { text, .. } => text.clone(),
            Self::RequestFailed { .. } => REQUEST_FAILED.to_string(),
            Self::TooShort { .. } => TOO_SHORT.to_string(),
            Self::Skipped { after } => format!("{SKIPPED_PREFIX}{after}{SKIPPED_SUFFIX}"),
            Self::Pending => NOT_PROCESSED.to_string(),
        }
    }

    fn from_marker(text: String, degraded: u32) -> Self {
        match text.as_str() {
            REQUEST_FAILED => Self::RequestFailed { degraded },
            TOO_SHORT | LEGACY_TOO_SHORT => Self::TooShort { degraded },
            NOT_PROCESSED => Self::Pending,
            _ => match parse_skipped(&text) {
                Some(after) => Self::Skipped { after },
                None => Self::Success { text, degraded },
            },
        }
    }
}

fn parse_skipped(text: &str) -> Option<u32> {
    text.strip_prefix(SKIPPED_PREFIX)?
        .strip_suffix(SKIPPED_SUFFIX)?
        .parse()
        .ok()
}

/// Accepted on-disk shapes: the `[text, n]` pair, or a bare string from
/// result files that predate the degrade counter.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Pair(String, u32),
    Text(String),
}

impl From<RawResponse> for Response {
    fn from(raw: RawResponse) -> Self {
        match raw {
            RawResponse::Pair(text, degraded) => Self::from_marker(text, degraded),
            RawResponse::Text(text) => Self::from_marker(text, 0),
        }
    }
}

impl From<Response> for (String, u32) {
    fn from(r: Response) -> Self {
        let degraded = r.degraded();
        match r {
            Response::Success { text, .. } => (text, degraded),
            other => (other.text(), degraded),
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { text, degraded } => {
                let preview: String = text.chars().take(60).collect();
                write!(f, "success ({degraded} shrinks): {preview}")
            }
            Self::RequestFailed { degraded } => write!(f, "{REQUEST_FAILED} ({degraded} shrinks)"),
            Self::TooShort { degraded } => write!(f, "too short after {degraded} shrinks"),
            Self::Skipped { after } => write!(f, "skipped after {after} fails"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// One line of a result file.
///
/// Unknown fields found on load are carried through untouched on rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "ID", deserialize_with = "text_or_number")]
    pub id: String,
    #[serde(deserialize_with = "text_or_number")]
    pub changed_label: String,
    #[serde(deserialize_with = "text_or_number")]
    pub label_value: String,
    pub response: Response,
    #[serde(default)]
    pub true_answer: Value,
    #[serde(default)]
    pub fail_count: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultRecord {
    /// Fresh placeholder for an item with no prior record.
    pub fn pending(item: &WorkItem, true_answer: Value) -> Self {
        Self {
            id: item.id.clone(),
            changed_label: item.changed_label.clone(),
            label_value: item.label_value.clone(),
            response: Response::Pending,
            true_answer,
            fail_count: 0,
            extra: Map::new(),
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.id, &self.changed_label, &self.label_value)
    }

    /// Done for good: a terminal response, or a generic failure that has
    /// already used up `max_fail_count` attempts.
    pub fn is_terminal(&self, max_fail_count: u32) -> bool {
        self.response.is_terminal()
            || (self.response.is_request_failed() && self.fail_count >= max_fail_count)
    }

    /// Apply a fresh outcome.
    ///
    /// A generic failure bumps `fail_count`; reaching the cap turns the
    /// record into the skipped marker. Any other outcome resets the count.
    pub fn record_outcome(&mut self, response: Response, max_fail_count: u32) {
        if response.is_request_failed() {
            self.fail_count += 1;
            self.response = if self.fail_count >= max_fail_count {
                Response::Skipped {
                    after: self.fail_count,
                }
            } else {
                response
            };
        } else {
            self.fail_count = 0;
            self.response = response;
        }
    }
}
