use std::time::Duration;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "gameon";
const DEFAULT_CHANGES_TIMEOUT: Duration = Duration::from_secs(25);

/// Basic-auth pair sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchCredentials {
    pub username: String,
    pub password: String,
}

/// Location of the CouchDB database that stores all three tournament collections.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub credentials: Option<CouchCredentials>,
    /// How long a `_changes` long-poll may stay open before CouchDB answers empty.
    pub changes_timeout: Duration,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
            changes_timeout: DEFAULT_CHANGES_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(CouchCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` (defaults to `gameon`), and the optional
    /// `COUCH_USERNAME` / `COUCH_PASSWORD` / `COUCH_CHANGES_TIMEOUT_MS`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let base_url = var("COUCH_BASE_URL").ok_or(CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = var("COUCH_DB")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        let mut config = Self::new(base_url, database);
        if let (Some(username), Some(password)) = (var("COUCH_USERNAME"), var("COUCH_PASSWORD")) {
            config = config.with_credentials(username, password);
        }
        if let Some(timeout_ms) = var("COUCH_CHANGES_TIMEOUT_MS").and_then(|value| value.parse::<u64>().ok()) {
            config.changes_timeout = Duration::from_millis(timeout_ms);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> CouchResult<CouchConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        CouchConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn only_the_base_url_is_required() {
        let config = config_from(&[("COUCH_BASE_URL", "http://couch:5984")]).unwrap();
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert_eq!(config.credentials, None);
        assert_eq!(config.changes_timeout, DEFAULT_CHANGES_TIMEOUT);

        let err = config_from(&[("COUCH_DB", "cup")]).unwrap_err();
        assert!(matches!(err, CouchDaoError::MissingEnvVar { var: "COUCH_BASE_URL" }));
    }

    #[test]
    fn credentials_need_both_halves() {
        let config = config_from(&[
            ("COUCH_BASE_URL", "http://couch:5984"),
            ("COUCH_USERNAME", "admin"),
            ("COUCH_CHANGES_TIMEOUT_MS", "500"),
        ])
        .unwrap();
        assert_eq!(config.credentials, None);
        assert_eq!(config.changes_timeout, Duration::from_millis(500));

        let config = config_from(&[
            ("COUCH_BASE_URL", "http://couch:5984"),
            ("COUCH_USERNAME", "admin"),
            ("COUCH_PASSWORD", "secret"),
        ])
        .unwrap();
        assert_eq!(config.credentials.unwrap().username, "admin");
    }
}
