//! SQLite repository implementation
//!
//! Row-level reads and writes of managed objects. Writes take a
//! `Transaction` so a context save lands atomically.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use recordsync_core::{ObjectId, RemoteId, SyncStamps};
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use serde_json::{Map, Value};

use crate::errors::{from_rusqlite, Result};

/// One persisted object as it sits in the `records` table
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub object_id: ObjectId,
    pub entity: String,
    pub remote_id: Option<RemoteId>,
    pub stamps: SyncStamps,
    pub attributes: Map<String, Value>,
}

const RECORD_COLUMNS: &str = "object_id, entity, remote_id, created_at, updated_at, attributes";

fn to_millis(stamp: Option<DateTime<Utc>>) -> Option<i64> {
    stamp.map(|dt| dt.timestamp_millis())
}

fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let object_id: String = row.get(0)?;
    let remote_id: Option<String> = row.get(2)?;
    let attributes = match row.get::<_, Value>(5)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    Ok(StoredRecord {
        object_id: ObjectId::from_string(object_id),
        entity: row.get(1)?,
        remote_id: remote_id.map(RemoteId::new),
        stamps: SyncStamps::new(from_millis(row.get(3)?), from_millis(row.get(4)?)),
        attributes,
    })
}

/// SQLite repository for managed objects
pub struct SqliteRepo;

impl SqliteRepo {
    /// Insert a new record within a transaction
    pub fn insert_record_tx(tx: &Transaction, record: &StoredRecord) -> Result<()> {
        tx.execute(
            "INSERT INTO records (object_id, entity, remote_id, created_at, updated_at, attributes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record.object_id.as_str(),
                record.entity,
                record.remote_id.as_ref().map(RemoteId::as_str),
                to_millis(record.stamps.created_at),
                to_millis(record.stamps.updated_at),
                Value::Object(record.attributes.clone()),
            ],
        )
        .map_err(from_rusqlite)?;

        Ok(())
    }

    /// Overwrite an existing record within a transaction
    ///
    /// A record deleted by another context in the meantime is re-inserted,
    /// so the latest save wins.
    pub fn update_record_tx(tx: &Transaction, record: &StoredRecord) -> Result<()> {
        tx.execute(
            "INSERT INTO records (object_id, entity, remote_id, created_at, updated_at, attributes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(object_id) DO UPDATE SET
                remote_id = excluded.remote_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                attributes = excluded.attributes",
            rusqlite::params![
                record.object_id.as_str(),
                record.entity,
                record.remote_id.as_ref().map(RemoteId::as_str),
                to_millis(record.stamps.created_at),
                to_millis(record.stamps.updated_at),
                Value::Object(record.attributes.clone()),
            ],
        )
        .map_err(from_rusqlite)?;

        Ok(())
    }

    /// Delete a record within a transaction; deleting a missing row is a no-op
    pub fn delete_record_tx(tx: &Transaction, object_id: &ObjectId) -> Result<()> {
        tx.execute(
            "DELETE FROM records WHERE object_id = ?1",
            [object_id.as_str()],
        )
        .map_err(from_rusqlite)?;

        Ok(())
    }

    /// Load one record by object id
    pub fn get_record(conn: &Connection, object_id: &ObjectId) -> Result<Option<StoredRecord>> {
        conn.query_row(
            &format!("SELECT {} FROM records WHERE object_id = ?1", RECORD_COLUMNS),
            [object_id.as_str()],
            record_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// First record of `entity` carrying `remote_id`, in insertion order
    /// Every record of `entity` carrying `remote_id`, in insertion order
    pub fn find_by_remote_id(
        conn: &Connection,
        entity: &str,
        remote_id: &RemoteId,
    ) -> Result<Vec<StoredRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM records WHERE entity = ?1 AND remote_id = ?2 ORDER BY rowid",
                RECORD_COLUMNS
            ))
            .map_err(from_rusqlite)?;

        let records = stmt
            .query_map(rusqlite::params![entity, remote_id.as_str()], record_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        Ok(records)
    }

    /// Every record of `entity`, in insertion order
    pub fn list_records(conn: &Connection, entity: &str) -> Result<Vec<StoredRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM records WHERE entity = ?1 ORDER BY rowid",
                RECORD_COLUMNS
            ))
            .map_err(from_rusqlite)?;

        let records = stmt
            .query_map([entity], record_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        Ok(records)
    }

    pub fn count_records(conn: &Connection, entity: &str) -> Result<usize> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE entity = ?1",
                [entity],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(count as usize)
    }

    pub fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM store_metadata WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn put_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO store_metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value, Utc::now().timestamp()],
        )
        .map_err(from_rusqlite)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::apply_migrations;
    use chrono::TimeZone;
    use serde_json::json;

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    fn record(entity: &str, remote_id: Option<&str>, name: &str) -> StoredRecord {
        StoredRecord {
            object_id: ObjectId::new(),
            entity: entity.to_string(),
            remote_id: remote_id.map(RemoteId::from),
            stamps: SyncStamps::new(
                Some(Utc.timestamp_millis_opt(1_388_534_400_123).unwrap()),
                None,
            ),
            attributes: json!({ "name": name }).as_object().cloned().unwrap(),
        }
    }

    fn insert(conn: &mut Connection, record: &StoredRecord) {
        let tx = conn.transaction().unwrap();
        SqliteRepo::insert_record_tx(&tx, record).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_insert_and_get_round_trips_stamps_and_attributes() {
        let mut conn = setup();
        let rec = record("User", Some("42"), "Alice");
        insert(&mut conn, &rec);

        let loaded = SqliteRepo::get_record(&conn, &rec.object_id).unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn test_find_by_remote_id_is_scoped_to_entity() {
        let mut conn = setup();
        insert(&mut conn, &record("User", Some("7"), "Alice"));
        let gist = record("Gist", Some("7"), "notes");
        insert(&mut conn, &gist);

        let found = SqliteRepo::find_by_remote_id(&conn, "Gist", &RemoteId::from("7")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].object_id, gist.object_id);
        assert!(SqliteRepo::find_by_remote_id(&conn, "User", &RemoteId::from("8"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_find_by_remote_id_returns_duplicates_in_insertion_order() {
        let mut conn = setup();
        let first = record("User", Some("1"), "first");
        let second = record("User", Some("1"), "second");
        insert(&mut conn, &first);
        insert(&mut conn, &second);

        let ids: Vec<ObjectId> = SqliteRepo::find_by_remote_id(&conn, "User", &RemoteId::from("1"))
            .unwrap()
            .into_iter()
            .map(|r| r.object_id)
            .collect();
        assert_eq!(ids, vec![first.object_id, second.object_id]);
    }

    #[test]
    fn test_update_and_delete() {
        let mut conn = setup();
        let mut rec = record("User", Some("1"), "Alice");
        insert(&mut conn, &rec);

        rec.attributes.insert("name".to_string(), json!("Alicia"));
        let tx = conn.transaction().unwrap();
        SqliteRepo::update_record_tx(&tx, &rec).unwrap();
        tx.commit().unwrap();
        let loaded = SqliteRepo::get_record(&conn, &rec.object_id).unwrap().unwrap();
        assert_eq!(loaded.attributes["name"], json!("Alicia"));

        let tx = conn.transaction().unwrap();
        SqliteRepo::delete_record_tx(&tx, &rec.object_id).unwrap();
        tx.commit().unwrap();
        assert_eq!(SqliteRepo::count_records(&conn, "User").unwrap(), 0);
    }

    #[test]
    fn test_list_records_in_insertion_order() {
        let mut conn = setup();
        for name in ["c", "a", "b"] {
            insert(&mut conn, &record("User", None, name));
        }
        let names: Vec<Value> = SqliteRepo::list_records(&conn, "User")
            .unwrap()
            .into_iter()
            .map(|r| r.attributes["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("c"), json!("a"), json!("b")]);
    }

    #[test]
    fn test_metadata_upsert() {
        let conn = setup();
        assert_eq!(SqliteRepo::get_metadata(&conn, "k").unwrap(), None);
        SqliteRepo::put_metadata(&conn, "k", "v1").unwrap();
        SqliteRepo::put_metadata(&conn, "k", "v2").unwrap();
        assert_eq!(SqliteRepo::get_metadata(&conn, "k").unwrap().as_deref(), Some("v2"));
    }
}
