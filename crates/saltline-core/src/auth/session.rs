use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Buffer before expiry inside which a token is treated as stale (30 seconds).
/// Covers clock skew and the time the next request spends in flight.
const TOKEN_REFRESH_BUFFER_SECS: i64 = 30;

/// An authenticated salt-api session.
///
/// Sessions are plain values: whoever logged in owns the session and passes
/// it to each call. Nothing is written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Endpoint the token was issued by
    pub base_url: String,
    pub token: String,
    pub user: Option<String>,
    pub eauth: Option<String>,
    #[serde(default)]
    pub perms: Vec<Value>,
    pub start: Option<DateTime<Utc>>,
    /// Unknown when the server does not report one; such tokens stay
    /// valid until the server rejects them
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|expiry| Utc::now() > expiry).unwrap_or(false)
    }

    /// Check if the token expires within the refresh buffer
    pub fn needs_refresh(&self) -> bool {
        self.expires_at
            .map(|expiry| Utc::now() + Duration::seconds(TOKEN_REFRESH_BUFFER_SECS) >= expiry)
            .unwrap_or(false)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expiry| expiry - Utc::now())
    }

    /// Whether the token was issued by the endpoint at `base_url`
    pub fn belongs_to(&self, base_url: &Url) -> bool {
        self.base_url == base_url.as_str()
    }

    /// Check if session is usable against `base_url` without logging in again
    pub fn is_valid_for(&self, base_url: &Url) -> bool {
        !self.token.is_empty() && self.belongs_to(base_url) && !self.needs_refresh()
    }
}
