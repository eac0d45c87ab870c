//! Repository layer for SQLite persistence.
//!
//! Each repository owns its schema, opens a short-lived connection per
//! operation, and stores datetimes as RFC 3339 text.

pub mod analysis;
pub mod document;
pub mod job;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

pub use analysis::AnalysisRepository;
pub use document::{DocumentRepository, ProcessingClaim};
pub use job::JobRepository;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a database connection with proper concurrency settings.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 30000;
    "#,
    )?;
    Ok(conn)
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
