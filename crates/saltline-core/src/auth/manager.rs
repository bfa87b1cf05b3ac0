use tracing::{debug, info};

use crate::api::{ApiError, HttpOptions, SaltApi};

use super::{Credentials, Session};

/// Obtains and refreshes sessions for one set of credentials.
#[derive(Clone, Debug)]
pub struct SessionManager {
    api: SaltApi,
    credentials: Credentials,
}

impl SessionManager {
    pub fn new(credentials: Credentials, options: &HttpOptions) -> Result<Self, ApiError> {
        let api = SaltApi::with_options(credentials.url(), options)?;
        Ok(Self { api, credentials })
    }

    /// Reuse an existing transport, sharing its connection pool
    pub fn with_api(api: SaltApi, credentials: Credentials) -> Self {
        Self { api, credentials }
    }

    pub fn api(&self) -> &SaltApi {
        &self.api
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Log in with the stored credentials. One HTTP call, no retry.
    pub async fn authenticate(&self) -> Result<Session, ApiError> {
        self.api.login(&self.credentials).await
    }

    /// Return `session` untouched while its token is usable, otherwise log in
    /// once more. A failed re-authentication is returned as-is.
    pub async fn ensure_valid(&self, session: Session) -> Result<Session, ApiError> {
        if session.is_valid_for(self.api.base_url()) {
            return Ok(session);
        }

        debug!(
            expires_at = ?session.expires_at,
            same_endpoint = session.belongs_to(self.api.base_url()),
            "Session no longer usable, re-authenticating"
        );
        let refreshed = self.authenticate().await?;
        info!("Session refreshed");
        Ok(refreshed)
    }

    /// End the session on the server
    pub async fn logout(&self, session: Session) -> Result<(), ApiError> {
        self.api.logout(&session).await
    }
}
