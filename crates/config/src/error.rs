use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating exporter settings.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Io {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for the settings layout.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// `connection.management_server` is missing or empty.
    #[error("missing required connection setting 'connection.management_server'")]
    MissingManagementServer,

    /// A user was configured without a password.
    #[error("connection user '{0}' configured without a password")]
    MissingPassword(String),

    /// Both `rules.include` and `rules.exclude` were set.
    #[error("include and exclude rule filters can not both be used at the same time")]
    ConflictingRuleFilters,

    /// A rule filter pattern does not compile.
    #[error("invalid rule pattern '{pattern}': {source}")]
    InvalidRulePattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying error.
        source: regex::Error,
    },

    /// Two rule names differ only in case.
    #[error("duplicate rule name found in rules counter mapping: '{0}'")]
    DuplicateCounterRule(String),

    /// Two rules map to the same metric name.
    #[error("duplicate value found in rules counter mapping: '{0}'")]
    DuplicateCounterMapping(String),

    /// A rule maps to a name that is not a valid metric name.
    #[error("rules counter mapping value '{0}' is not a valid metric name")]
    InvalidMetricName(String),

    /// `scrape_interval_seconds` does not fit a duration.
    #[error("invalid scrape interval {seconds}s: {source}")]
    InvalidScrapeInterval {
        /// The configured interval.
        seconds: f64,
        /// Underlying error.
        source: std::time::TryFromFloatSecsError,
    },

    /// The log sink endpoint is not a URL.
    #[error("invalid loki endpoint '{endpoint}': {source}")]
    InvalidLokiEndpoint {
        /// The offending endpoint.
        endpoint: String,
        /// Underlying error.
        source: url::ParseError,
    },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;
