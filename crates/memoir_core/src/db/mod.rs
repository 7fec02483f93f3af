//! SQLite storage bootstrap, schema migrations and the owned database handle.
//!
//! # Responsibility
//! - Open and configure SQLite connections for Memoir core.
//! - Apply schema migrations in deterministic order.
//! - Own the single connection used by repositories and track which tables
//!   each write touched so continuous queries can be refreshed.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - There is no process-global database instance; callers construct a
//!   [`MemoirDb`] and hand references to repositories.

mod handle;
pub mod migrations;
mod open;
pub mod watch;

pub use handle::MemoirDb;
pub use open::{open_db, open_db_in_memory};
pub use watch::Subscription;

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}
