//! Connection configuration.
//!
//! Values are resolved from, in increasing priority:
//!
//! 1. built-in defaults (`https://localhost:8000/`, eauth `auto`)
//! 2. the `[main]` section of `~/.saltlinerc` (INI)
//! 3. the `SALTAPI_URL`, `SALTAPI_USER`, `SALTAPI_PASS`, `SALTAPI_EAUTH`
//!    environment variables
//!
//! Command-line flags are layered on top by the caller with [`Config::merge`].

use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption};
use tracing::debug;

use crate::api::ApiError;
use crate::auth::Credentials;

/// Config file name in the user's home directory
const CONFIG_FILE: &str = ".saltlinerc";

/// INI section holding the connection keys
const CONFIG_SECTION: &str = "main";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "SALTLINE_CONFIG";

pub const ENV_URL: &str = "SALTAPI_URL";
pub const ENV_USER: &str = "SALTAPI_USER";
pub const ENV_PASS: &str = "SALTAPI_PASS";
pub const ENV_EAUTH: &str = "SALTAPI_EAUTH";

pub const DEFAULT_URL: &str = "https://localhost:8000/";
pub const DEFAULT_EAUTH: &str = "auto";

/// Values are taken verbatim: backslashes and quotes are part of the value
fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

/// Partially resolved connection settings. `None` means "not set at this
/// layer"; [`Config::credentials`] applies defaults and validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub eauth: Option<String>,
}

impl Config {
    /// Resolve file then environment, the file taken from `path`, then
    /// `SALTLINE_CONFIG`, then `~/.saltlinerc`
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .or_else(Self::default_path),
        };

        let file = match path {
            Some(ref p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(file.merge(Self::from_env()))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE))
    }

    /// Read an INI config file. A missing file yields an empty config.
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file_opt(path, parse_option()).map_err(|e| {
            ApiError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(Self::from_ini(&ini))
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ApiError> {
        let ini = Ini::load_from_str_opt(contents, parse_option())
            .map_err(|e| ApiError::Configuration(format!("invalid config file: {}", e)))?;
        Ok(Self::from_ini(&ini))
    }

    fn from_ini(ini: &Ini) -> Self {
        let Some(section) = ini.section(Some(CONFIG_SECTION)) else {
            return Self::default();
        };
        // Option names match in any case; the last occurrence wins
        let get = |key: &str| {
            section
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case(key))
                .last()
                .map(|(_, value)| value.to_string())
        };
        Self {
            url: get(ENV_URL),
            user: get(ENV_USER),
            password: get(ENV_PASS),
            eauth: get(ENV_EAUTH),
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read the `SALTAPI_*` variables through `lookup`
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup(ENV_URL),
            user: lookup(ENV_USER),
            password: lookup(ENV_PASS),
            eauth: lookup(ENV_EAUTH),
        }
    }

    /// Layer `other` on top of `self`; values set in `other` win
    pub fn merge(self, other: Config) -> Config {
        Config {
            url: other.url.or(self.url),
            user: other.user.or(self.user),
            password: other.password.or(self.password),
            eauth: other.eauth.or(self.eauth),
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_URL)
    }

    pub fn eauth(&self) -> &str {
        self.eauth.as_deref().unwrap_or(DEFAULT_EAUTH)
    }

    /// Apply defaults and validate into login credentials
    pub fn credentials(&self) -> Result<Credentials, ApiError> {
        let user = self
            .user
            .clone()
            .ok_or_else(|| ApiError::Configuration(format!("{} required", ENV_USER)))?;
        Credentials::new(self.url(), user, self.password.clone(), self.eauth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = "\
[main]
SALTAPI_URL=https://salt.example.com:8000/
SALTAPI_USER=saltdev
SALTAPI_PASS=saltdev
SALTAPI_EAUTH=pam
";

    #[test]
    fn test_from_ini_str() {
        let config = Config::from_ini_str(SAMPLE).unwrap();
        assert_eq!(config.url.as_deref(), Some("https://salt.example.com:8000/"));
        assert_eq!(config.user.as_deref(), Some("saltdev"));
        assert_eq!(config.password.as_deref(), Some("saltdev"));
        assert_eq!(config.eauth.as_deref(), Some("pam"));
    }

    #[test]
    fn test_values_are_verbatim() {
        let config =
            Config::from_ini_str("[main]\nSALTAPI_USER=u\nSALTAPI_PASS=back\\slash\n").unwrap();
        assert_eq!(config.password.as_deref(), Some("back\\slash"));

        let config = Config::from_ini_str("[main]\nSALTAPI_PASS=\"quoted\"\n").unwrap();
        assert_eq!(config.password.as_deref(), Some("\"quoted\""));

        let config = Config::from_ini_str("[main]\nSALTAPI_PASS='single' pw\n").unwrap();
        assert_eq!(config.password.as_deref(), Some("'single' pw"));
    }

    #[test]
    fn test_keys_match_any_case() {
        let config =
            Config::from_ini_str("[main]\nsaltapi_pass=lower\nSaltApi_User=mixed\n").unwrap();
        assert_eq!(config.password.as_deref(), Some("lower"));
        assert_eq!(config.user.as_deref(), Some("mixed"));
    }

    #[test]
    fn test_other_sections_ignored() {
        let config = Config::from_ini_str("[other]\nSALTAPI_USER=nope\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [("SALTAPI_USER", "envuser"), ("SALTAPI_EAUTH", "ldap")]
            .into_iter()
            .collect();
        let config = Config::from_ini_str(SAMPLE)
            .unwrap()
            .merge(Config::from_env_with(|k| env.get(k).map(|v| v.to_string())));

        assert_eq!(config.user.as_deref(), Some("envuser"));
        assert_eq!(config.eauth(), "ldap");
        // Untouched by the environment
        assert_eq!(config.password.as_deref(), Some("saltdev"));
        assert_eq!(config.url(), "https://salt.example.com:8000/");
    }

    #[test]
    fn test_defaults() {
        let config = Config {
            user: Some("saltdev".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        assert_eq!(config.url(), DEFAULT_URL);
        assert_eq!(config.eauth(), DEFAULT_EAUTH);

        let creds = config.credentials().unwrap();
        assert_eq!(creds.url().as_str(), DEFAULT_URL);
        assert_eq!(creds.eauth(), "auto");
    }

    #[test]
    fn test_missing_user_is_configuration_error() {
        let err = Config::default().credentials().unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref m) if m == "SALTAPI_USER required"));
    }

    #[test]
    fn test_kerberos_needs_no_password() {
        let config = Config {
            user: Some("saltdev".into()),
            eauth: Some("kerberos".into()),
            ..Default::default()
        };
        assert_eq!(config.credentials().unwrap().password(), None);
    }

    #[test]
    fn test_bad_url_is_rejected() {
        let config = Config {
            url: Some("localhost:8000".into()),
            user: Some("saltdev".into()),
            password: Some("pw".into()),
            eauth: None,
        };
        assert!(matches!(config.credentials(), Err(ApiError::Configuration(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.user.as_deref(), Some("saltdev"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join("absent")).unwrap();
        assert_eq!(config, Config::default());
    }
}
