//! Aggregate repositories over the local SQLite schema.
//!
//! # Responsibility
//! - Own every multi-table read/write that assembles or mutates an aggregate.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Multi-table writes run inside one immediate transaction and flush
//!   change notifications only after commit.
//! - Operating on a missing parent is reported as `false`/`None`, never as
//!   an error.
//! - Read paths reject undecodable persisted rows instead of masking them.

pub mod album_repo;
pub mod journal_repo;
pub(crate) mod rows;

use crate::db::DbError;
use rusqlite::Connection;
use std::collections::BTreeMap;
use thiserror::Error;

/// Every data table of the latest schema.
pub const DATA_TABLES: &[&str] = &[
    "journal_entry",
    "photo_asset",
    "tag",
    "entry_photo",
    "entry_tag",
    "photo_tag",
    "album",
    "album_member",
    "album_entry",
    "album_photo",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Caller input rejected before touching storage.
    #[error("validation failed: {0}")]
    Validation(String),
    /// SQLite or bootstrap failure, including constraint violations.
    #[error(transparent)]
    Db(#[from] DbError),
    /// Connection was not migrated far enough for this repository.
    #[error("repository requires table `{0}`")]
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Row count per data table.
pub fn table_counts(conn: &Connection) -> RepoResult<BTreeMap<&'static str, i64>> {
    ensure_tables(conn, DATA_TABLES)?;
    let mut counts = BTreeMap::new();
    for &table in DATA_TABLES {
        counts.insert(table, rows::count_rows(conn, table)?);
    }
    Ok(counts)
}

pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for &table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
