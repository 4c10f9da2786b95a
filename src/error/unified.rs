//! Error classification and the platform's error body.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    NotFound,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Storage,
    Unknown,
}

/// Structured error body returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorDetails {
    /// Parse an error body. Returns `None` for non-JSON bodies or bodies with no known field.
    pub fn parse(body: &str) -> Option<Self> {
        let details: Self = serde_json::from_str(body).ok()?;
        if details == Self::default() {
            return None;
        }
        Some(details)
    }

    /// Best human-readable description.
    pub fn summary(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
