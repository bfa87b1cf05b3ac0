use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed{}: {message}", status_suffix(.status))]
    Authentication { status: Option<u16>, message: String },

    #[error("Request failed{}: {}", status_suffix(.status), truncate_body(.body))]
    Client { status: Option<u16>, body: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid printing excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Client {
            status: Some(status.as_u16()),
            body: body.to_string(),
        }
    }

    /// HTTP status attached to the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. } | ApiError::Client { status, .. } => *status,
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::Configuration(_) => None,
        }
    }

    /// The server rejected the token attached to the request
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Client { status: Some(401), .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_keeps_raw_body() {
        let err = ApiError::from_status(reqwest::StatusCode::UNAUTHORIZED, "denied");
        match &err {
            ApiError::Client { status, body } => {
                assert_eq!(*status, Some(401));
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Request failed (HTTP 401): denied");
    }

    #[test]
    fn test_display_truncates_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let err = ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &body);

        let message = err.to_string();
        assert!(message.contains("truncated, 600 total bytes"));
        // The raw body is still available in full
        if let ApiError::Client { body: raw, .. } = err {
            assert_eq!(raw.len(), 600);
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = format!("{}é", "a".repeat(MAX_ERROR_BODY_LENGTH - 1));
        let truncated = truncate_body(&body);
        assert!(truncated.starts_with(&"a".repeat(MAX_ERROR_BODY_LENGTH - 1)));
    }

    #[test]
    fn test_authentication_message() {
        let err = ApiError::Authentication {
            status: Some(401),
            message: "Could not authenticate using provided credentials".into(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication failed (HTTP 401): Could not authenticate using provided credentials"
        );
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
    }
}
