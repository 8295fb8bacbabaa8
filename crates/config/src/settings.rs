use crate::error::{Error, Result};

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Raw settings file contents, before validation.
///
/// Every section is optional; absent values fall back to the defaults applied by
/// [`crate::ExporterConfig`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Management server connection.
    pub connection: ConnectionSettings,

    /// Rule selection and metric naming.
    pub rules: RulesSettings,

    /// Interval between scrape and log shipping cycles. Non-positive values are ignored.
    pub scrape_interval_seconds: Option<f64>,

    /// Monitor state export.
    pub monitors: FeedSettings,

    /// Event export.
    pub events: FeedSettings,

    /// Alert export.
    pub alerts: FeedSettings,

    /// Log sink.
    pub loki: LokiSettings,

    /// Log shipping bookmark.
    pub bookmark: BookmarkSettings,

    /// Address the HTTP front door binds to.
    pub listen_address: Option<SocketAddr>,
}

/// `connection` section.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Management server host name.
    pub management_server: Option<String>,
    /// Optional user name.
    pub user: Option<String>,
    /// Password for `user`.
    pub password: Option<String>,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("management_server", &self.management_server)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// `rules` section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RulesSettings {
    /// Rule name patterns to include.
    pub include: Option<Vec<String>>,
    /// Rule name patterns to exclude.
    pub exclude: Option<Vec<String>>,
    /// Whether performance metrics are exported at all.
    pub enabled: Option<bool>,
    /// Rule name to metric name overrides.
    pub map: HashMap<String, String>,
}

/// `monitors`, `events` and `alerts` sections.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Whether the feed is exported.
    pub enabled: Option<bool>,
}

/// `loki` section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LokiSettings {
    /// Base URL of the push API.
    pub endpoint: Option<String>,
}

/// `bookmark` section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BookmarkSettings {
    /// File the bookmark is persisted to.
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content)
    }

    /// Parses settings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` does not parse.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_parses() {
        let settings = Settings::from_json("{}").unwrap();

        assert!(settings.connection.management_server.is_none());
        assert!(settings.rules.include.is_none());
        assert!(settings.rules.map.is_empty());
        assert!(settings.listen_address.is_none());
    }

    #[test]
    fn test_full_document_parses() {
        let settings = Settings::from_json(
            r#"{
                "connection": { "management_server": "scom01", "user": "svc", "password": "pw" },
                "rules": { "include": ["^Perf"], "enabled": false, "map": { "Rule A": "rule_a" } },
                "scrape_interval_seconds": 30,
                "monitors": { "enabled": false },
                "events": { "enabled": true },
                "loki": { "endpoint": "http://loki:3100" },
                "bookmark": { "path": "/var/lib/scom/bookmark.txt" },
                "listen_address": "0.0.0.0:9000"
            }"#,
        )
        .unwrap();

        assert_eq!(
            settings.connection.management_server.as_deref(),
            Some("scom01")
        );
        assert_eq!(settings.rules.include, Some(vec!["^Perf".to_string()]));
        assert_eq!(settings.rules.enabled, Some(false));
        assert_eq!(settings.scrape_interval_seconds, Some(30.0));
        assert_eq!(settings.monitors.enabled, Some(false));
        assert_eq!(settings.alerts.enabled, None);
        assert_eq!(
            settings.listen_address,
            Some("0.0.0.0:9000".parse().unwrap())
        );
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let settings = Settings::from_json(
            r#"{ "connection": { "management_server": "scom01", "user": "svc", "password": "hunter2" } }"#,
        )
        .unwrap();

        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(matches!(
            Settings::from_json(r#"{ "scrape_interval_seconds": "soon" }"#),
            Err(Error::Parse(_))
        ));
    }
}
