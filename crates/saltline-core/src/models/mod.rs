//! Data models for salt-api requests and replies.
//!
//! - `LowState`: one command, with `ClientKind` and `TargetType`
//! - `Response`: decoded reply carrying the untransformed `return` payload
//! - `AsyncJob`: job id and minion list from `local_async`

pub mod lowstate;
pub mod response;

pub use lowstate::{ClientKind, LowState, TargetType};
pub use response::{AsyncJob, Response, RESULT_KEY};
