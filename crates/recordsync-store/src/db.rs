//! Database connection management
//!
//! Opens the SQLite connection behind a store and applies the configured
//! store options.

#![allow(clippy::result_large_err)]

use rusqlite::{Connection, OpenFlags};

use crate::config::{StoreLocation, StoreOptions};
use crate::errors::{from_rusqlite, io_error, ConfigError, Result};
use recordsync_core::RecordSyncError;

/// Open the store at `location` honouring `options`
pub fn open(location: &StoreLocation, options: &StoreOptions) -> Result<Connection> {
    let conn = match location {
        StoreLocation::InMemory => {
            if options.read_only {
                return Err(ConfigError::ReadOnlyInMemory.into());
            }
            open_in_memory()?
        }
        StoreLocation::File(path) => {
            let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if options.read_only {
                flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
            } else {
                flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
                if options.create_if_missing {
                    flags |= OpenFlags::SQLITE_OPEN_CREATE;
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| io_error("create_store_dir", e))?;
                    }
                }
            }
            Connection::open_with_flags(path, flags).map_err(from_rusqlite)?
        }
    };

    configure(&conn, options)?;
    Ok(conn)
}

/// Open an in-memory SQLite database
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Apply every configured pragma
pub fn configure(conn: &Connection, options: &StoreOptions) -> Result<()> {
    for (name, value) in &options.pragmas {
        validate_pragma(name, value)?;
        // switching journal mode writes to the database header
        if options.read_only && name.eq_ignore_ascii_case("journal_mode") {
            continue;
        }
        // journal_mode answers with a row, so this goes through execute_batch
        conn.execute_batch(&format!("PRAGMA {} = {};", name, value))
            .map_err(from_rusqlite)?;
    }
    Ok(())
}

/// Pragma names and values are spliced into SQL, so neither may end the statement
fn validate_pragma(name: &str, value: &str) -> Result<()> {
    let name_ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !name_ok {
        return Err(RecordSyncError::InvalidStoreOption {
            name: name.to_string(),
            reason: "pragma names may only contain letters, digits and '_'".to_string(),
        }
        .into());
    }

    if !is_pragma_value(value) {
        return Err(RecordSyncError::InvalidStoreOption {
            name: name.to_string(),
            reason: format!("unsupported pragma value '{}'", value),
        }
        .into());
    }

    Ok(())
}

/// Bare token, signed number, or quoted literal with no embedded quote
fn is_pragma_value(value: &str) -> bool {
    let is_token = |v: &str| !v.is_empty() && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let is_digits = |v: &str| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit());

    if is_token(value) {
        return true;
    }

    let unsigned = value.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(value);
    let is_number = match unsigned.split_once('.') {
        Some((whole, frac)) => is_digits(whole) && is_digits(frac),
        None => is_digits(unsigned),
    };
    if is_number {
        return true;
    }

    ['\'', '"'].into_iter().any(|quote| {
        value.len() >= 2
            && value.starts_with(quote)
            && value.ends_with(quote)
            && value[1..value.len() - 1]
                .chars()
                .all(|c| c != quote && !c.is_control())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordsync_core::ExErrorKind;

    #[test]
    fn test_open_in_memory_applies_pragmas() {
        let options = StoreOptions::default().with_pragma("user_version", "7");
        let conn = open(&StoreLocation::InMemory, &options).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 7);
    }

    #[test]
    fn test_rejects_injected_pragma() {
        let options = StoreOptions::default().with_pragma("user_version", "1; DROP TABLE x");
        let err = open(&StoreLocation::InMemory, &options).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
    }

    #[test]
    fn test_quoted_and_signed_values_are_forwarded() {
        let options = StoreOptions::default()
            .with_pragma("user_version", "'12'")
            .with_pragma("cache_size", "-2000");
        let conn = open(&StoreLocation::InMemory, &options).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        let cache: i64 = conn
            .query_row("PRAGMA cache_size", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 12);
        assert_eq!(cache, -2000);
    }

    #[test]
    fn test_pragma_value_grammar() {
        for ok in ["WAL", "5000", "-2000", "+1.5", "'off'", "\"NORMAL\""] {
            assert!(is_pragma_value(ok), "{}", ok);
        }
        for bad in ["", "1.", "--1", "'off", "'a'; DROP TABLE x; '", "1 2", "a-b"] {
            assert!(!is_pragma_value(bad), "{}", bad);
        }
    }

    #[test]
    fn test_read_only_in_memory_is_rejected() {
        let options = StoreOptions::default().read_only(true);
        let err = open(&StoreLocation::InMemory, &options).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
    }

    #[test]
    fn test_file_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.sqlite");
        let _conn = open(&StoreLocation::File(path.clone()), &StoreOptions::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_file_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = StoreOptions::default();
        options.create_if_missing = false;
        let err = open(&StoreLocation::File(dir.path().join("absent.sqlite")), &options).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
    }
}
