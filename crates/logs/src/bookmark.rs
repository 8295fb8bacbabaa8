use crate::error::{Error, Result};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

/// Persists the lower bound of the next alert and event query in a text file.
#[derive(Clone, Debug)]
pub struct BookmarkStore {
    path: PathBuf,
}

impl BookmarkStore {
    /// Creates a store backed by `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the bookmark, or returns `now - interval` when there is none.
    ///
    /// An unreadable or corrupt file is logged and treated as missing.
    pub async fn load(&self, interval: Duration) -> DateTime<Utc> {
        let fallback = || Utc::now() - interval;

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no bookmark at {}, starting one interval ago", self.path.display());
                return fallback();
            }
            Err(e) => {
                warn!("unable to read bookmark {}: {e}", self.path.display());
                return fallback();
            }
        };

        match DateTime::parse_from_rfc3339(contents.trim()) {
            Ok(bookmark) => bookmark.with_timezone(&Utc),
            Err(e) => {
                warn!(
                    "ignoring corrupt bookmark {} ({:?}): {e}",
                    self.path.display(),
                    contents.trim()
                );
                fallback()
            }
        }
    }

    /// Writes `bookmark`, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, bookmark: DateTime<Utc>) -> Result<()> {
        tokio::fs::write(
            &self.path,
            bookmark.to_rfc3339_opts(SecondsFormat::Micros, true),
        )
        .await
        .map_err(|source| Error::Bookmark {
            path: self.path.clone(),
            source,
        })
    }
}
