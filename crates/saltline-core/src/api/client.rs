//! HTTP transport for the salt-api REST interface.
//!
//! `SaltApi` knows the endpoint layout of `rest_cherrypy`: where to log in,
//! where commands are posted, and how replies are wrapped. It holds no
//! session of its own; every authenticated method takes the `Session` to
//! use, so callers decide how tokens are shared.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{Credentials, Session};
use crate::models::{LowState, Response};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Header carrying the session token on authenticated requests
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Options forwarded unchanged to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Skip TLS certificate verification (self-signed salt-api setups)
    pub accept_invalid_certs: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    eauth: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginReturn {
    token: String,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    expire: Option<f64>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    eauth: Option<String>,
    #[serde(default)]
    perms: Vec<Value>,
}

/// Lowstate with login details embedded, for the sessionless `/run` endpoint
#[derive(Debug, Serialize)]
struct UnsessionedLowState<'a> {
    #[serde(flatten)]
    low: &'a LowState,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    eauth: &'a str,
}

/// Convert salt's float epoch seconds to a timestamp
fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract().abs() * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(whole, nanos)
}

/// Transport for one salt-api endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct SaltApi {
    client: Client,
    base_url: Url,
}

impl SaltApi {
    /// Create a transport with default options
    pub fn new(base_url: &Url) -> Result<Self, ApiError> {
        Self::with_options(base_url, &HttpOptions::default())
    }

    pub fn with_options(base_url: &Url, options: &HttpOptions) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .default_headers(Self::default_headers())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.clone(),
        })
    }

    fn default_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::HeaderName::from_static("x-requested-with"),
            header::HeaderValue::from_static("XMLHttpRequest"),
        );
        headers
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint path beneath the base URL, keeping any path prefix
    /// the base carries (`https://h/salt-api/` + `/login` -> `https://h/salt-api/login`).
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Configuration(format!("invalid endpoint path '{}': {}", path, e)))
    }

    /// Resolve `path` and append `segments` percent-encoded, so characters
    /// such as `?`, `#` or `/` inside a segment stay part of the path.
    pub fn endpoint_with<'a>(
        &self,
        path: &str,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, ApiError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::Configuration(format!("'{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request.header(AUTH_TOKEN_HEADER, &session.token)
    }

    /// Send a request, returning the status and body of a 2xx reply.
    async fn send_raw(&self, request: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "salt-api returned an error status");
            return Err(ApiError::from_status(status, &body));
        }
        Ok((status, body))
    }

    /// Send a request and decode the salt-api reply.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let (status, body) = self.send_raw(request).await?;
        Response::from_body(status, &body)
    }

    /// Send a request whose reply is plain JSON rather than `return`-wrapped
    async fn send_json(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let (status, body) = self.send_raw(request).await?;
        serde_json::from_str(&body).map_err(|_| ApiError::from_status(status, &body))
    }

    // ===== Authentication =====

    /// Log in and return a session bound to this endpoint
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let url = self.endpoint("/login")?;
        debug!(url = %url, user = credentials.username(), eauth = credentials.eauth(), "Logging in");

        let request = LoginRequest {
            username: credentials.username(),
            password: credentials.password(),
            eauth: credentials.eauth(),
        };
        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Authentication {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let reply = Response::from_body(status, &body)?;
        let login: LoginReturn = reply
            .first()
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| ApiError::from_status(status, &body))?;

        info!(user = credentials.username(), "Authenticated with salt-api");

        Ok(Session {
            base_url: self.base_url.to_string(),
            token: login.token,
            user: login.user,
            eauth: login.eauth,
            perms: login.perms,
            start: login.start.and_then(epoch_to_datetime),
            expires_at: login.expire.and_then(epoch_to_datetime),
        })
    }

    /// Invalidate the session token on the server
    pub async fn logout(&self, session: &Session) -> Result<(), ApiError> {
        let url = self.endpoint("/logout")?;
        self.send_raw(self.authed(self.client.post(url), session))
            .await?;
        info!("Logged out of salt-api");
        Ok(())
    }

    // ===== Commands =====

    /// Post lowstate commands to the root endpoint
    pub async fn run(&self, session: &Session, commands: &[LowState]) -> Result<Response, ApiError> {
        let url = self.endpoint("/")?;
        debug!(commands = commands.len(), "Posting lowstate");
        let request = self.authed(self.client.post(url), session).json(commands);
        self.send(request).await
    }

    /// Post an already-built lowstate body as-is
    pub async fn run_raw(&self, session: &Session, body: &Value) -> Result<Response, ApiError> {
        let url = self.endpoint("/")?;
        let request = self.authed(self.client.post(url), session).json(body);
        self.send(request).await
    }

    /// Run commands through `/run`, authenticating each lowstate with the
    /// credentials instead of a session token
    pub async fn run_unsessioned(
        &self,
        credentials: &Credentials,
        commands: &[LowState],
    ) -> Result<Response, ApiError> {
        let url = self.endpoint("/run")?;
        let body: Vec<UnsessionedLowState<'_>> = commands
            .iter()
            .map(|low| UnsessionedLowState {
                low,
                username: credentials.username(),
                password: credentials.password(),
                eauth: credentials.eauth(),
            })
            .collect();
        self.send(self.client.post(url).json(&body)).await
    }

    // ===== Collections =====

    /// Look up a job by id, or list recent jobs
    pub async fn jobs(&self, session: &Session, jid: Option<&str>) -> Result<Response, ApiError> {
        let url = match jid {
            Some(jid) => self.endpoint_with("/jobs", [jid])?,
            None => self.endpoint("/jobs")?,
        };
        self.send(self.authed(self.client.get(url), session)).await
    }

    /// Grains for one minion, or for all of them
    pub async fn minions(&self, session: &Session, mid: Option<&str>) -> Result<Response, ApiError> {
        let url = match mid {
            Some(mid) => self.endpoint_with("/minions", [mid])?,
            None => self.endpoint("/minions")?,
        };
        self.send(self.authed(self.client.get(url), session)).await
    }

    /// Server statistics; the reply is not wrapped in `return`
    pub async fn stats(&self, session: &Session) -> Result<Value, ApiError> {
        let url = self.endpoint("/stats")?;
        self.send_json(self.authed(self.client.get(url), session))
            .await
    }

    /// Fire an event on the master's event bus through `/hook/<path>`
    pub async fn hook(
        &self,
        session: Option<&Session>,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        // Slashes separate tag components; every other character is escaped
        let tag = path.split('/').filter(|part| !part.is_empty());
        let url = self.endpoint_with("/hook", tag)?;
        let mut request = self.client.post(url).json(body);
        if let Some(session) = session {
            request = self.authed(request, session);
        }
        self.send_json(request).await
    }
}
