//! Authentication module for salt-api sessions and credentials.
//!
//! This module provides:
//! - `Credentials`: endpoint URL, username, password and eauth backend
//! - `Session`: token issued by `/login`, with its expiry
//! - `SessionManager`: logs in and re-authenticates when a token goes stale
//!
//! Sessions live in memory only.

pub mod credentials;
pub mod manager;
pub mod session;

pub use credentials::{Credentials, KERBEROS_EAUTH};
pub use manager::SessionManager;
pub use session::Session;
