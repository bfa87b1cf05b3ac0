use std::fmt;

use reqwest::Url;

use crate::api::ApiError;

/// eauth backend that authenticates through the transport instead of a password
pub const KERBEROS_EAUTH: &str = "kerberos";

/// Login details for one salt-api endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    url: Url,
    username: String,
    password: Option<String>,
    eauth: String,
}

impl Credentials {
    /// Build credentials, checking the endpoint URL.
    ///
    /// The URL must be `http` or `https`. A password is required for every
    /// eauth backend except kerberos, where any given password is dropped.
    pub fn new(
        url: &str,
        username: impl Into<String>,
        password: Option<String>,
        eauth: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let url = parse_api_url(url)?;
        let username = username.into();
        let eauth = eauth.into();

        if username.is_empty() {
            return Err(ApiError::Configuration("SALTAPI_USER required".into()));
        }
        let password = if eauth == KERBEROS_EAUTH {
            None
        } else {
            match password {
                Some(p) => Some(p),
                None => return Err(ApiError::Configuration("SALTAPI_PASS required".into())),
            }
        };

        Ok(Self {
            url,
            username,
            password,
            eauth,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn eauth(&self) -> &str {
        &self.eauth
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("eauth", &self.eauth)
            .finish()
    }
}

/// Parse a salt-api base URL. The path always ends in `/` so relative
/// endpoint paths join beneath it rather than replacing its last segment.
pub fn parse_api_url(url: &str) -> Result<Url, ApiError> {
    let mut parsed = Url::parse(url)
        .map_err(|e| ApiError::Configuration(format!("invalid salt-api URL '{}': {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Configuration(format!(
            "salt-api URL missing HTTP(s) protocol: {}",
            url
        )));
    }
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds =
            Credentials::new("https://h:8000", "saltdev", Some("saltdev".into()), "pam").unwrap();
        assert_eq!(creds.url().as_str(), "https://h:8000/");
        assert_eq!(creds.username(), "saltdev");
        assert_eq!(creds.password(), Some("saltdev"));
        assert_eq!(creds.eauth(), "pam");
    }

    #[test]
    fn test_password_required_unless_kerberos() {
        let err = Credentials::new("https://h:8000", "saltdev", None, "pam").unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref m) if m.contains("SALTAPI_PASS")));

        let creds =
            Credentials::new("https://h:8000", "saltdev", Some("ignored".into()), "kerberos")
                .unwrap();
        assert_eq!(creds.password(), None);
    }

    #[test]
    fn test_username_required() {
        let err = Credentials::new("https://h:8000", "", Some("x".into()), "pam").unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref m) if m.contains("SALTAPI_USER")));
    }

    #[test]
    fn test_parse_api_url() {
        assert_eq!(
            parse_api_url("https://localhost:8000/salt-api").unwrap().as_str(),
            "https://localhost:8000/salt-api/"
        );
        assert_eq!(
            parse_api_url("http://salt.example.com/").unwrap().as_str(),
            "http://salt.example.com/"
        );
        assert!(parse_api_url("ftp://salt.example.com").is_err());
        assert!(parse_api_url("localhost:8000").is_err());
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds =
            Credentials::new("https://h:8000", "saltdev", Some("hunter2".into()), "pam").unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
