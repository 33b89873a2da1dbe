//! Versioned schema migrations.
//!
//! The applied version lives in `PRAGMA user_version`. Each migration runs in
//! its own transaction together with the version bump.

use rusqlite::Connection;
use stmtdb_core::StorageError;

pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Ordered by version; never edit an entry once released, append a new one.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial",
        sql: include_str!("../migrations/0001_initial.sql"),
    },
    Migration {
        version: 2,
        name: "account_number_unique",
        sql: include_str!("../migrations/0002_account_number_unique.sql"),
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))
}

/// Applies every migration newer than the database's version.
/// Returns the number of migrations applied.
pub fn run_migrations(conn: &mut Connection) -> Result<usize, StorageError> {
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration).map_err(|e| StorageError::Migration {
            version: migration.version,
            message: e.to_string(),
        })?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
        applied += 1;
    }

    Ok(applied)
}

fn apply(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.pragma_update(None, "user_version", migration.version)?;
    tx.commit()
}
