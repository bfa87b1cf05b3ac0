//! Client library for the Salt REST API (`rest_cherrypy`).
//!
//! ```no_run
//! use saltline_core::{Client, Config, HttpOptions, LowState};
//!
//! # async fn run() -> Result<(), saltline_core::ApiError> {
//! let credentials = Config::load(None)?.credentials()?;
//! let mut client = Client::new(credentials, &HttpOptions::default())?;
//! let reply = client.call(&LowState::local("*", "test.ping")).await?;
//! println!("{}", reply.result);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod models;

pub use api::{ApiError, HttpOptions, SaltApi};
pub use auth::{Credentials, Session, SessionManager};
pub use client::Client;
pub use config::Config;
pub use models::{AsyncJob, ClientKind, LowState, Response, TargetType};
