//! Owned database handle shared by repositories.
//!
//! # Responsibility
//! - Own the migrated connection for the process lifetime.
//! - Open write transactions with an immediate write lock.
//! - Record which tables committed writes touched and flush them to the
//!   continuous-query registry.
//!
//! # Invariants
//! - Changes from rolled-back transactions are discarded, never flushed.
//! - Repositories flush after every committed write operation.

use super::open::{open_db, open_db_in_memory};
use super::watch::WatchRegistry;
use super::DbResult;
use rusqlite::hooks::Action;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

type TouchedTables = Arc<Mutex<BTreeSet<String>>>;

/// Explicitly constructed database handle.
///
/// Create one at startup and pass `&MemoirDb` to every repository. The
/// handle is `Send` so it can live on a worker thread, but it is used from
/// one thread at a time.
pub struct MemoirDb {
    conn: Connection,
    touched: TouchedTables,
    watchers: WatchRegistry,
}

impl MemoirDb {
    /// Opens (or creates) a database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a fresh in-memory database with the latest schema.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection and installs change tracking.
    pub fn from_connection(conn: Connection) -> Self {
        let touched: TouchedTables = Arc::default();

        let on_update = Arc::clone(&touched);
        conn.update_hook(Some(
            move |_action: Action, _db: &str, table: &str, _rowid: i64| {
                if let Ok(mut tables) = on_update.lock() {
                    if !tables.contains(table) {
                        tables.insert(table.to_string());
                    }
                }
            },
        ));

        let on_rollback = Arc::clone(&touched);
        conn.rollback_hook(Some(move || {
            if let Ok(mut tables) = on_rollback.lock() {
                tables.clear();
            }
        }));

        Self {
            conn,
            touched,
            watchers: WatchRegistry::default(),
        }
    }

    /// Read access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Starts a write transaction holding the write lock from the start.
    ///
    /// Dropping the returned transaction without committing rolls back.
    pub fn write_tx(&self) -> rusqlite::Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
    }

    /// Pushes fresh snapshots to every subscription whose tables were
    /// touched by writes committed since the last flush.
    pub fn flush_changes(&self) {
        self.watchers
            .dispatch(&self.conn, || take_touched(&self.touched));
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.watchers.len()
    }

    pub(crate) fn watchers(&self) -> &WatchRegistry {
        &self.watchers
    }
}

fn take_touched(touched: &TouchedTables) -> BTreeSet<String> {
    match touched.lock() {
        Ok(mut tables) => std::mem::take(&mut *tables),
        Err(_) => BTreeSet::new(),
    }
}
