//! Exporter configuration: the settings file model and its validated form.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod rules;
mod settings;

pub use error::{Error, Result};
pub use rules::{CounterMap, RuleFilter};
pub use settings::{
    BookmarkSettings, ConnectionSettings, FeedSettings, LokiSettings, RulesSettings, Settings,
};

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use url::Url;

/// Scrape interval used when none is configured.
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(60);

/// Log sink used when none is configured.
pub const DEFAULT_LOKI_ENDPOINT: &str = "http://localhost:12346";

/// Bookmark file used when none is configured.
pub const DEFAULT_BOOKMARK_PATH: &str = "bookmark.txt";

/// Address the HTTP front door binds to when none is configured.
pub const DEFAULT_LISTEN_ADDRESS: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 3005);

/// Credentials for the management server.
#[derive(Clone, Eq, PartialEq)]
pub struct Credential {
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Management server connection target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Connection {
    /// Management server host name.
    pub management_server: String,
    /// Credentials; the ambient identity is used when absent.
    pub credential: Option<Credential>,
}

/// Which feeds are exported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportFlags {
    /// Performance counters.
    pub metrics: bool,
    /// Monitor health states.
    pub monitors: bool,
    /// Alerts.
    pub alerts: bool,
    /// Events.
    pub events: bool,
}

impl Default for ExportFlags {
    fn default() -> Self {
        Self {
            metrics: true,
            monitors: true,
            alerts: true,
            events: true,
        }
    }
}

/// Validated exporter configuration.
#[derive(Clone, Debug)]
pub struct ExporterConfig {
    /// Management server connection target.
    pub connection: Connection,

    /// Which performance rules are collected.
    pub rule_filter: RuleFilter,

    /// Metric name overrides keyed by lowercase rule name.
    pub counter_map: CounterMap,

    /// Interval between scrape and log shipping cycles.
    pub scrape_interval: Duration,

    /// Which feeds are exported.
    pub export: ExportFlags,

    /// Base URL of the log sink.
    pub loki_endpoint: Url,

    /// File the log shipping bookmark is persisted to.
    pub bookmark_path: PathBuf,

    /// Address the HTTP front door binds to.
    pub listen_address: SocketAddr,
}

impl ExporterConfig {
    /// Reads and validates a settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading settings from {}", path.display());

        Self::try_from(Settings::from_file(path)?)
    }
}

impl TryFrom<Settings> for ExporterConfig {
    type Error = Error;

    fn try_from(settings: Settings) -> Result<Self> {
        let Settings {
            connection,
            rules,
            scrape_interval_seconds,
            monitors,
            events,
            alerts,
            loki,
            bookmark,
            listen_address,
        } = settings;

        let management_server = connection
            .management_server
            .filter(|server| !server.is_empty())
            .ok_or(Error::MissingManagementServer)?;

        let credential = match (connection.user, connection.password) {
            (Some(user), _) if user.is_empty() => None,
            (None, _) => None,
            (Some(user), Some(password)) if !password.is_empty() => {
                Some(Credential { user, password })
            }
            (Some(user), _) => return Err(Error::MissingPassword(user)),
        };

        let rule_filter = RuleFilter::new(rules.include, rules.exclude)?;
        let counter_map = CounterMap::new(rules.map)?;

        let scrape_interval = match scrape_interval_seconds {
            Some(seconds) if seconds.is_finite() && seconds > 0.0 => {
                debug!("scrape interval override: {seconds}s");
                Duration::try_from_secs_f64(seconds)
                    .map_err(|source| Error::InvalidScrapeInterval { seconds, source })?
            }
            _ => DEFAULT_SCRAPE_INTERVAL,
        };

        let defaults = ExportFlags::default();
        let export = ExportFlags {
            metrics: rules.enabled.unwrap_or(defaults.metrics),
            monitors: monitors.enabled.unwrap_or(defaults.monitors),
            alerts: alerts.enabled.unwrap_or(defaults.alerts),
            events: events.enabled.unwrap_or(defaults.events),
        };

        let endpoint = loki
            .endpoint
            .unwrap_or_else(|| DEFAULT_LOKI_ENDPOINT.to_string());
        let loki_endpoint = Url::parse(&endpoint)
            .map_err(|source| Error::InvalidLokiEndpoint { endpoint, source })?;

        let config = Self {
            connection: Connection {
                management_server,
                credential,
            },
            rule_filter,
            counter_map,
            scrape_interval,
            export,
            loki_endpoint,
            bookmark_path: bookmark
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOKMARK_PATH)),
            listen_address: listen_address.unwrap_or(DEFAULT_LISTEN_ADDRESS),
        };

        info!(
            "configured for {} (metrics: {}, monitors: {}, alerts: {}, events: {}, interval: {:?})",
            config.connection.management_server,
            config.export.metrics,
            config.export.monitors,
            config.export.alerts,
            config.export.events,
            config.scrape_interval
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(json: &str) -> Settings {
        Settings::from_json(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config =
            ExporterConfig::try_from(settings(r#"{ "connection": { "management_server": "scom01" } }"#))
                .unwrap();

        assert_eq!(config.connection.management_server, "scom01");
        assert!(config.connection.credential.is_none());
        assert!(matches!(config.rule_filter, RuleFilter::All));
        assert!(config.counter_map.is_empty());
        assert_eq!(config.scrape_interval, DEFAULT_SCRAPE_INTERVAL);
        assert_eq!(config.export, ExportFlags::default());
        assert_eq!(config.loki_endpoint.as_str(), "http://localhost:12346/");
        assert_eq!(config.bookmark_path, PathBuf::from("bookmark.txt"));
        assert_eq!(config.listen_address, "127.0.0.1:3005".parse().unwrap());
    }

    #[test]
    fn test_missing_management_server() {
        assert!(matches!(
            ExporterConfig::try_from(settings("{}")),
            Err(Error::MissingManagementServer)
        ));
        assert!(matches!(
            ExporterConfig::try_from(settings(r#"{ "connection": { "management_server": "" } }"#)),
            Err(Error::MissingManagementServer)
        ));
    }

    #[test]
    fn test_credentials() {
        let config = ExporterConfig::try_from(settings(
            r#"{ "connection": { "management_server": "scom01", "user": "svc", "password": "pw" } }"#,
        ))
        .unwrap();
        assert_eq!(
            config.connection.credential,
            Some(Credential {
                user: "svc".to_string(),
                password: "pw".to_string()
            })
        );

        assert!(matches!(
            ExporterConfig::try_from(settings(
                r#"{ "connection": { "management_server": "scom01", "user": "svc" } }"#
            )),
            Err(Error::MissingPassword(user)) if user == "svc"
        ));
    }

    #[test]
    fn test_include_and_exclude_conflict() {
        let result = ExporterConfig::try_from(settings(
            r#"{
                "connection": { "management_server": "scom01" },
                "rules": { "include": ["a"], "exclude": ["b"] }
            }"#,
        ));

        assert!(matches!(result, Err(Error::ConflictingRuleFilters)));
    }

    #[test]
    fn test_non_positive_interval_is_ignored() {
        for interval in ["0", "-5"] {
            let config = ExporterConfig::try_from(settings(&format!(
                r#"{{ "connection": {{ "management_server": "scom01" }}, "scrape_interval_seconds": {interval} }}"#
            )))
            .unwrap();
            assert_eq!(config.scrape_interval, DEFAULT_SCRAPE_INTERVAL);
        }

        let config = ExporterConfig::try_from(settings(
            r#"{ "connection": { "management_server": "scom01" }, "scrape_interval_seconds": 15 }"#,
        ))
        .unwrap();
        assert_eq!(config.scrape_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_oversized_interval_is_rejected() {
        let result = ExporterConfig::try_from(settings(
            r#"{ "connection": { "management_server": "scom01" }, "scrape_interval_seconds": 1e20 }"#,
        ));

        assert!(matches!(
            result,
            Err(Error::InvalidScrapeInterval { seconds, .. }) if seconds > 1e19
        ));
    }

    #[test]
    fn test_feed_overrides() {
        let config = ExporterConfig::try_from(settings(
            r#"{
                "connection": { "management_server": "scom01" },
                "rules": { "enabled": false },
                "alerts": { "enabled": false }
            }"#,
        ))
        .unwrap();

        assert_eq!(
            config.export,
            ExportFlags {
                metrics: false,
                monitors: true,
                alerts: false,
                events: true,
            }
        );
    }

    #[test]
    fn test_invalid_loki_endpoint() {
        let result = ExporterConfig::try_from(settings(
            r#"{ "connection": { "management_server": "scom01" }, "loki": { "endpoint": "not a url" } }"#,
        ));

        assert!(matches!(result, Err(Error::InvalidLokiEndpoint { .. })));
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let credential = Credential {
            user: "svc".to_string(),
            password: "hunter2".to_string(),
        };

        assert!(!format!("{credential:?}").contains("hunter2"));
    }
}
