//! High-level salt-api client.
//!
//! `Client` owns one `SessionManager` and the session it obtained. Every
//! command goes through `call`, which makes sure a usable session exists
//! first and then sends exactly one request. Nothing is retried: a 401 on a
//! command is returned to the caller, and the session is dropped so the
//! following call logs in again.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::api::{ApiError, HttpOptions, SaltApi};
use crate::auth::{Credentials, Session, SessionManager};
use crate::models::{AsyncJob, ClientKind, LowState, Response};

pub struct Client {
    sessions: SessionManager,
    session: Option<Session>,
}

impl Client {
    pub fn new(credentials: Credentials, options: &HttpOptions) -> Result<Self, ApiError> {
        Ok(Self::from_manager(SessionManager::new(credentials, options)?))
    }

    pub fn from_manager(sessions: SessionManager) -> Self {
        Self {
            sessions,
            session: None,
        }
    }

    /// Start from a session obtained elsewhere
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn api(&self) -> &SaltApi {
        self.sessions.api()
    }

    /// Log in now instead of on the first call
    pub async fn login(&mut self) -> Result<&Session, ApiError> {
        let session = self.sessions.authenticate().await?;
        let session = self.session.insert(session);
        Ok(&*session)
    }

    /// Log out and forget the session. A no-op without one.
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        match self.session.take() {
            Some(session) => self.sessions.logout(session).await,
            None => Ok(()),
        }
    }

    async fn valid_session(&mut self) -> Result<Session, ApiError> {
        match self.session.take() {
            Some(session) => self.sessions.ensure_valid(session).await,
            None => {
                debug!("No session yet, authenticating");
                self.sessions.authenticate().await
            }
        }
    }

    /// Keep the session for the next call unless the server rejected it
    fn settle<T>(&mut self, session: Session, result: &Result<T, ApiError>) {
        match result {
            Err(e) if e.is_unauthorized() => {
                warn!("salt-api rejected the session token, dropping session");
            }
            _ => self.session = Some(session),
        }
    }

    /// Send one command and return the decoded reply.
    pub async fn call(&mut self, request: &LowState) -> Result<Response, ApiError> {
        let session = self.valid_session().await?;
        debug!(client = %request.client, fun = %request.fun, "Calling salt-api");
        let result = self
            .sessions
            .api()
            .run(&session, std::slice::from_ref(request))
            .await;
        self.settle(session, &result);
        result
    }

    /// Send a caller-built lowstate body (a list of commands) unchanged
    pub async fn call_raw(&mut self, body: &Value) -> Result<Response, ApiError> {
        let session = self.valid_session().await?;
        let result = self.sessions.api().run_raw(&session, body).await;
        self.settle(session, &result);
        result
    }

    /// Run commands through `/run` with the credentials; no session is used
    pub async fn run_unsessioned(&self, commands: &[LowState]) -> Result<Response, ApiError> {
        self.sessions
            .api()
            .run_unsessioned(self.sessions.credentials(), commands)
            .await
    }

    // ===== Client shortcuts =====

    fn with_client(mut request: LowState, client: ClientKind) -> Result<LowState, ApiError> {
        request.client = client;
        if client.requires_target() && request.tgt.is_none() {
            return Err(ApiError::Configuration(format!(
                "the {} client requires a target expression",
                client
            )));
        }
        Ok(request)
    }

    /// First element of a list result. Flagged or differently shaped replies
    /// become errors carrying the reply's status and raw body.
    fn first_result(mut response: Response) -> Result<Value, ApiError> {
        if response.success {
            if let Value::Array(items) = &mut response.result {
                if !items.is_empty() {
                    return Ok(items.swap_remove(0));
                }
            }
        }
        Err(response.into_error())
    }

    /// Run an execution function on the targeted minions and wait for the
    /// results, keyed by minion id
    pub async fn local(&mut self, request: LowState) -> Result<Value, ApiError> {
        let request = Self::with_client(request, ClientKind::Local)?;
        Self::first_result(self.call(&request).await?)
    }

    /// Start an execution function without waiting; poll with `lookup_job`
    pub async fn local_async(&mut self, request: LowState) -> Result<AsyncJob, ApiError> {
        let request = Self::with_client(request, ClientKind::LocalAsync)?;
        let response = self.call(&request).await?;
        let job = response
            .first()
            .filter(|_| response.success)
            .and_then(|first| AsyncJob::deserialize(first).ok());
        job.ok_or_else(|| response.into_error())
    }

    /// Run in staged batches (`batch` defaults to 50%), one result per batch
    pub async fn local_batch(&mut self, request: LowState) -> Result<Vec<Value>, ApiError> {
        let mut request = Self::with_client(request, ClientKind::LocalBatch)?;
        if request.batch.is_none() {
            request.batch = Some("50%".to_string());
        }
        match self.call(&request).await? {
            Response {
                success: true,
                result: Value::Array(items),
                ..
            } => Ok(items),
            other => Err(other.into_error()),
        }
    }

    /// Run a runner function on the master
    pub async fn runner(&mut self, request: LowState) -> Result<Value, ApiError> {
        let request = Self::with_client(request, ClientKind::Runner)?;
        Self::first_result(self.call(&request).await?)
    }

    /// Run a wheel function on the master
    pub async fn wheel(&mut self, request: LowState) -> Result<Value, ApiError> {
        let request = Self::with_client(request, ClientKind::Wheel)?;
        Self::first_result(self.call(&request).await?)
    }

    // ===== Collections =====

    /// Results of a previously started job
    pub async fn lookup_job(&mut self, jid: &str) -> Result<Value, ApiError> {
        let session = self.valid_session().await?;
        let result = self.sessions.api().jobs(&session, Some(jid)).await;
        self.settle(session, &result);
        Self::first_result(result?)
    }

    /// Grains of one minion, or of every minion when `mid` is `None`
    pub async fn minions(&mut self, mid: Option<&str>) -> Result<Map<String, Value>, ApiError> {
        let session = self.valid_session().await?;
        let result = self.sessions.api().minions(&session, mid).await;
        self.settle(session, &result);
        let response = result?;
        match response.first() {
            Some(Value::Object(grains)) if response.success => Ok(grains.clone()),
            _ => Err(response.into_error()),
        }
    }

    pub async fn stats(&mut self) -> Result<Value, ApiError> {
        let session = self.valid_session().await?;
        let result = self.sessions.api().stats(&session).await;
        self.settle(session, &result);
        result
    }

    /// Fire an event on the master event bus
    pub async fn hook(&mut self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let session = self.valid_session().await?;
        let result = self.sessions.api().hook(Some(&session), path, body).await;
        self.settle(session, &result);
        result
    }
}
