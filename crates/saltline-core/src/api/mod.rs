//! HTTP transport module for salt-api.
//!
//! This module provides `SaltApi` for talking to the `rest_cherrypy`
//! endpoints (login, lowstate commands, jobs, minions, hooks) and the
//! `ApiError` type every operation in the crate returns.
//!
//! Authenticated requests carry the session token in the `X-Auth-Token`
//! header.

pub mod client;
pub mod error;

pub use client::{HttpOptions, SaltApi, DEFAULT_TIMEOUT_SECS};
pub use error::ApiError;
