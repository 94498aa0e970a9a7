//! On-disk cache of API responses.
//!
//! Provider responses are stored verbatim in `SQLite`, keyed by a blake3 hash
//! of the request URL. Entries older than the configured TTL are treated as
//! missing, so repeated checks for the same place within a few minutes do not
//! hit the network again.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Cache of raw response bodies.
#[derive(Debug)]
pub struct ResponseCache {
    path: PathBuf,
    conn: Connection,
}

/// Hash used as the primary key for a URL.
fn url_key(url: &str) -> String {
    blake3::hash(url.as_bytes()).to_hex().to_string()
}

/// Fixed-width timestamps keep lexicographic and chronological order equal.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl ResponseCache {
    /// Open or create a cache database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or the schema cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening response cache at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self { path, conn })
    }

    /// Create an in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self { path, conn })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Body cached for `url`, if it is younger than `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get(&self, url: &str, ttl: Duration) -> Result<Option<String>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT body, fetched_at FROM responses WHERE url_hash = ?1",
                [url_key(url)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((body, fetched_at)) = row else {
            return Ok(None);
        };

        // Entries from the future (clock changes) count as stale.
        let fresh = parse_timestamp(&fetched_at)
            .and_then(|ts| Utc::now().signed_duration_since(ts).to_std().ok())
            .is_some_and(|age| age < ttl);

        Ok(fresh.then_some(body))
    }

    /// Store `body` as the latest response for `url`.
    ///
    /// Only the hash of `url` is kept; `shown_url` is what gets written in
    /// clear, so callers pass a form without credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn put(&self, url: &str, shown_url: &str, body: &str) -> Result<()> {
        self.put_at(url, shown_url, body, Utc::now())
    }

    fn put_at(
        &self,
        url: &str,
        shown_url: &str,
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO responses (url_hash, url, body, fetched_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![url_key(url), shown_url, body, format_timestamp(fetched_at)],
        )?;
        Ok(())
    }

    /// Number of cached responses.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete entries fetched more than `max_age` ago.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_older_than(&self, max_age: chrono::Duration) -> Result<usize> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return Ok(0);
        };
        let cutoff = format_timestamp(cutoff);
        let affected = self
            .conn
            .execute("DELETE FROM responses WHERE fetched_at < ?1", [cutoff])?;
        if affected > 0 {
            info!("Pruned {} cached responses", affected);
        }
        Ok(affected)
    }

    /// Delete every cached response.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM responses", [])?;
        info!("Cleared {} cached responses", affected);
        Ok(affected)
    }

    /// Summary of the cache contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn stats(&self) -> Result<CacheStats> {
        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(fetched_at), MAX(fetched_at) FROM responses",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.as_os_str() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(CacheStats {
            path: self.path.clone(),
            entries: self.count()?,
            oldest_entry: oldest.as_deref().and_then(parse_timestamp),
            newest_entry: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }
}

/// Statistics about the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Database location.
    pub path: PathBuf,
    /// Number of cached responses.
    pub entries: i64,
    /// When the oldest entry was fetched.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// When the newest entry was fetched.
    pub newest_entry: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
