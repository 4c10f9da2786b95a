use chrono::Utc;
use serde::{Deserialize, Serialize};

const BEARER: &str = "bearer";

/// Bearer credential issued by the platform, as persisted in storage.
///
/// `expire_time` is an absolute epoch-millisecond deadline derived once when
/// the token is stored; `expires_in` and `sliding_window` are the relative
/// lifetimes (seconds) the server sent.
///
/// # Example
/// ```
/// use baas_client::auth::Token;
///
/// let token = Token::bearer("opaque").with_expires_in(3600);
/// assert_eq!(token.authorization_header(), "Bearer opaque");
/// assert_eq!(token.deadline_from(1_000), Some(3_601_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(rename = "expireTime", default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sliding_window: Option<u64>,
    #[serde(rename = "tokenUrl", default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl Token {
    pub fn new(token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
            expire_time: None,
            expires_in: None,
            sliding_window: None,
            token_url: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(token, BEARER)
    }

    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn with_sliding_window(mut self, seconds: u64) -> Self {
        self.sliding_window = Some(seconds);
        self
    }

    pub fn with_expire_time(mut self, epoch_millis: i64) -> Self {
        self.expire_time = Some(epoch_millis);
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Translate the platform's OAuth-style response into a token.
    pub fn from_provider_response(response: ProviderTokenResponse) -> Self {
        Self {
            token: response.access_token,
            token_type: response.token_type,
            expire_time: None,
            expires_in: response.expires_in,
            sliding_window: response.sliding_window,
            token_url: response.token_url,
        }
    }

    /// Absolute deadline: the stored `expire_time`, else `now_ms` plus
    /// `expires_in`, else `now_ms` plus `sliding_window`.
    pub fn deadline_from(&self, now_ms: i64) -> Option<i64> {
        if self.expire_time.is_some() {
            return self.expire_time;
        }
        self.expires_in
            .or(self.sliding_window)
            .map(|seconds| now_ms.saturating_add(seconds_to_millis(seconds)))
    }

    /// True once the deadline has passed. Tokens without a deadline never expire.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expire_time.is_some_and(|deadline| deadline <= now_ms)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case(BEARER) {
            format!("Bearer {}", self.token)
        } else {
            format!("{} {}", self.token_type, self.token)
        }
    }
}

impl From<ProviderTokenResponse> for Token {
    fn from(response: ProviderTokenResponse) -> Self {
        Self::from_provider_response(response)
    }
}

/// Token response as returned by the platform's login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub sliding_window: Option<u64>,
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_token_type() -> String {
    BEARER.to_string()
}

fn seconds_to_millis(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX).saturating_mul(1000)
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
