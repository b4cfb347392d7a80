//! Migration runner
//!
//! Applies embedded migrations in order, each inside its own transaction.
//! Applied migrations are recorded in `schema_version` with a checksum; a
//! recorded checksum that no longer matches the embedded SQL is an error.

#![allow(clippy::result_large_err)]

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::get_migrations;

/// Apply all pending migrations, returning the ids that were applied
pub fn apply_migrations(conn: &mut Connection) -> Result<Vec<&'static str>> {
    create_schema_version_table(conn)?;

    let mut applied = Vec::new();
    for migration in get_migrations() {
        if apply_migration(conn, migration.id, migration.sql)? {
            debug!(migration_id = migration.id, "applied migration");
            applied.push(migration.id);
        }
    }

    Ok(applied)
}

/// Ids of migrations not yet applied to this database
///
/// Read-only: never creates the bookkeeping table.
pub fn pending_migrations(conn: &Connection) -> Result<Vec<&'static str>> {
    let migrations = get_migrations();
    if !is_initialised(conn)? {
        return Ok(migrations.iter().map(|m| m.id).collect());
    }

    let mut pending = Vec::new();
    for migration in migrations {
        match recorded_checksum(conn, migration.id)? {
            None => pending.push(migration.id),
            Some(recorded) => verify_checksum(migration.id, recorded, migration.sql)?,
        }
    }
    Ok(pending)
}

/// Whether any migration was ever applied to this database
pub fn is_initialised(conn: &Connection) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(true),
        )
        .optional()
        .map_err(from_rusqlite)?;
    Ok(found.unwrap_or(false))
}

fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// `None` when the migration was never applied
fn recorded_checksum(conn: &Connection, migration_id: &str) -> Result<Option<Option<String>>> {
    conn.query_row(
        "SELECT checksum FROM schema_version WHERE migration_id = ?",
        [migration_id],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

fn verify_checksum(migration_id: &str, recorded: Option<String>, sql: &str) -> Result<()> {
    let actual = compute_checksum(sql);
    match recorded {
        Some(expected) if expected != actual => {
            Err(checksum_mismatch(migration_id, &expected, &actual))
        }
        _ => Ok(()),
    }
}

/// Returns true when the migration ran
fn apply_migration(conn: &mut Connection, migration_id: &str, sql: &str) -> Result<bool> {
    if let Some(recorded) = recorded_checksum(conn, migration_id)? {
        verify_checksum(migration_id, recorded, sql)?;
        return Ok(false);
    }

    let checksum = compute_checksum(sql);
    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(sql)
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;

    let now = chrono::Utc::now().timestamp();
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
        rusqlite::params![migration_id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordsync_core::ExErrorKind;

    #[test]
    fn test_apply_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&mut conn).unwrap();
        assert_eq!(applied, vec!["001_initial_schema", "002_store_metadata"]);
    }

    #[test]
    fn test_idempotency() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        let applied = apply_migrations(&mut conn).unwrap();
        assert!(applied.is_empty());
    }

    #[test]
    fn test_pending_on_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!is_initialised(&conn).unwrap());
        assert_eq!(pending_migrations(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_nothing_pending_after_apply() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert!(pending_migrations(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_edited_migration_is_detected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "UPDATE schema_version SET checksum = 'deadbeef' WHERE migration_id = '001_initial_schema'",
            [],
        )
        .unwrap();

        let err = apply_migrations(&mut conn).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
        assert_eq!(err.op(), Some("migration_checksum"));
    }
}
