//! Store coordinator
//!
//! Owns the single SQLite connection behind a persistence manager. Contexts
//! read through it and commit their change sets through it; the mutex
//! serialises both.

#![allow(clippy::result_large_err)]

use std::sync::{Mutex, MutexGuard};

use recordsync_core::{ObjectId, RecordSyncError, RemoteId};
use rusqlite::Connection;

use crate::config::StoreLocation;
use crate::errors::{from_rusqlite, lock_poisoned, Result};
use crate::repo::{SqliteRepo, StoredRecord};

/// Writes produced by one context save
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    pub inserts: Vec<StoredRecord>,
    pub updates: Vec<StoredRecord>,
    pub deletes: Vec<ObjectId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

#[derive(Debug)]
pub struct StoreCoordinator {
    conn: Mutex<Connection>,
    location: StoreLocation,
    read_only: bool,
}

impl StoreCoordinator {
    pub(crate) fn new(conn: Connection, location: StoreLocation, read_only: bool) -> Self {
        Self {
            conn: Mutex::new(conn),
            location,
            read_only,
        }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| lock_poisoned("store connection"))
    }

    pub fn get(&self, object_id: &ObjectId) -> Result<Option<StoredRecord>> {
        let conn = self.lock()?;
        SqliteRepo::get_record(&conn, object_id)
    }

    pub fn find_by_remote_id(
        &self,
        entity: &str,
        remote_id: &RemoteId,
    ) -> Result<Vec<StoredRecord>> {
        let conn = self.lock()?;
        SqliteRepo::find_by_remote_id(&conn, entity, remote_id)
    }

    pub fn list(&self, entity: &str) -> Result<Vec<StoredRecord>> {
        let conn = self.lock()?;
        SqliteRepo::list_records(&conn, entity)
    }

    pub fn count(&self, entity: &str) -> Result<usize> {
        let conn = self.lock()?;
        SqliteRepo::count_records(&conn, entity)
    }

    /// Apply a change set in one transaction
    ///
    /// # Errors
    ///
    /// `ReadOnly` for a non-empty change set against a read-only store;
    /// `Persistence` if any write fails, in which case nothing is written.
    pub fn commit(&self, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        if self.read_only {
            return Err(RecordSyncError::ReadOnlyStore.into());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(from_rusqlite)?;

        for record in &changes.inserts {
            SqliteRepo::insert_record_tx(&tx, record)?;
        }
        for record in &changes.updates {
            SqliteRepo::update_record_tx(&tx, record)?;
        }
        for object_id in &changes.deletes {
            SqliteRepo::delete_record_tx(&tx, object_id)?;
        }

        tx.commit().map_err(from_rusqlite)?;
        Ok(())
    }

    /// Fold the WAL back into the main database file
    pub(crate) fn checkpoint(&self) -> Result<()> {
        if self.read_only || self.location == StoreLocation::InMemory {
            return Ok(());
        }
        let conn = self.lock()?;
        // Answers with a row, so execute_batch rather than execute
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(from_rusqlite)
    }
}
