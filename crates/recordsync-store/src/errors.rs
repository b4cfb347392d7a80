//! Error handling for recordsync-store
//!
//! Wraps the recordsync-core ExError with store-specific helpers

use recordsync_core::errors::{ExError, ExErrorKind};
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Failures raised while interpreting store configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not parse store config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not read store config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("read-only in-memory store cannot be initialised")]
    ReadOnlyInMemory,
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        ExError::new(ExErrorKind::Configuration)
            .with_op("store_config")
            .with_message(err.to_string())
    }
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create an error for a store that needs migrations it may not apply
pub fn migration_required(pending: &[&str]) -> ExError {
    ExError::new(ExErrorKind::ModelMismatch)
        .with_op("open_store")
        .with_message(format!(
            "Store needs migrations {} but auto_migrate is off or the store is read-only",
            pending.join(", ")
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create an error for a mutex poisoned by a panicking holder
pub fn lock_poisoned(what: &str) -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op("lock")
        .with_message(format!("{} lock poisoned by a panicked thread", what))
}
