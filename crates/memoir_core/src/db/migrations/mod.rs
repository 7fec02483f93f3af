//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically, forward only.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Every migration script is idempotent (`IF NOT EXISTS` everywhere).
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A database newer than this binary is rejected; there is no downgrade.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "journal",
        sql: include_str!("0001_journal.sql"),
    },
    Migration {
        version: 2,
        name: "albums",
        sql: include_str!("0002_albums.sql"),
    },
    Migration {
        version: 3,
        name: "album_photos",
        sql: include_str!("0003_album_photos.sql"),
    },
    Migration {
        version: 4,
        name: "photo_tags",
        sql: include_str!("0004_photo_tags.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_migrations_up_to(conn, latest_version())
}

/// Applies pending migrations up to and including `target_version`.
///
/// Used to stage older schemas, e.g. when verifying that data written under
/// version 1 survives the upgrade to the latest version.
pub fn apply_migrations_up_to(conn: &mut Connection, target_version: u32) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    let target = target_version.min(latest);
    if current_version >= target {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version || migration.version > target {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

/// Reads the schema version recorded in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
