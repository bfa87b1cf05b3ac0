//! Reply shapes returned by salt-api.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiError;

/// Top-level key salt-api places results under
pub const RESULT_KEY: &str = "return";

/// A decoded salt-api reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    /// The payload under `return`, exactly as the server sent it
    pub result: Value,
    pub error: Option<String>,
    /// HTTP status of the reply
    pub status: u16,
    /// Raw reply text, attached to errors about this reply
    #[serde(skip)]
    pub body: String,
}

impl Response {
    /// Decode a 2xx reply body. Bodies that are not JSON objects carrying
    /// `return` are reported as malformed with the raw text attached.
    pub fn from_body(status: StatusCode, body: &str) -> Result<Self, ApiError> {
        let parsed: Value =
            serde_json::from_str(body).map_err(|_| ApiError::from_status(status, body))?;

        let Value::Object(mut fields) = parsed else {
            return Err(ApiError::from_status(status, body));
        };
        let result = fields
            .remove(RESULT_KEY)
            .ok_or_else(|| ApiError::from_status(status, body))?;
        let error = fields
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            success: error.is_none(),
            result,
            error,
            status: status.as_u16(),
            body: body.to_string(),
        })
    }

    /// Turn this reply into a `Client` error carrying its status and raw body,
    /// for replies flagged by salt-api or shaped unlike what was asked for
    pub fn into_error(self) -> ApiError {
        ApiError::Client {
            status: Some(self.status),
            body: self.body,
        }
    }

    /// The result payload, or an error when salt-api flagged the reply
    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.success {
            Ok(self.result)
        } else {
            Err(self.into_error())
        }
    }

    /// First element of a list result, the shape single-command replies use
    pub fn first(&self) -> Option<&Value> {
        self.result.as_array().and_then(|items| items.first())
    }
}

/// Job handle returned by the `local_async` client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncJob {
    pub jid: String,
    #[serde(default)]
    pub minions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_is_untransformed() {
        let resp = Response::from_body(StatusCode::OK, r#"{"return": [{"minion1": true}]}"#).unwrap();
        assert!(resp.success);
        assert_eq!(resp.result, json!([{"minion1": true}]));
        assert_eq!(resp.first(), Some(&json!({"minion1": true})));
        assert_eq!(resp.error, None);
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn test_server_error_field() {
        let resp = Response::from_body(
            StatusCode::OK,
            r#"{"return": "No permission", "error": "Permission denied"}"#,
        )
        .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Permission denied"));
        assert_eq!(resp.result, json!("No permission"));
        assert_eq!(resp.first(), None);

        let body = r#"{"return": "No permission", "error": "Permission denied"}"#;
        match resp.into_result() {
            Err(ApiError::Client { status, body: raw }) => {
                assert_eq!(status, Some(200));
                assert_eq!(raw, body);
            }
            other => panic!("expected flagged reply to be an error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_bodies() {
        for body in ["<html>oops</html>", "[1, 2]", r#"{"status": 200}"#] {
            match Response::from_body(StatusCode::OK, body) {
                Err(ApiError::Client { status, body: raw }) => {
                    assert_eq!(status, Some(200));
                    assert_eq!(raw, body);
                }
                other => panic!("expected malformed error for {body}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_async_job_parse() {
        let job: AsyncJob =
            serde_json::from_value(json!({"jid": "20240101120000123456", "minions": ["a", "b"]}))
                .unwrap();
        assert_eq!(job.jid, "20240101120000123456");
        assert_eq!(job.minions, vec!["a", "b"]);
    }
}
