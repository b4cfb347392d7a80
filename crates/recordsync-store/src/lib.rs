//! recordsync store - SQLite persistence for recordsync entities
//!
//! Provides:
//! - Store configuration (`StoreConfig`, TOML loadable) and connection setup
//! - Embedded migrations with checksum verification
//! - `PersistenceManager`: object model, attached store, main context
//! - `Context`: pending inserts, updates and deletes, committed by `save`
//! - `Repository<T>`: typed fetches plus remote-id lookup and payload
//!   reconciliation for `RemoteEntity` types

pub mod config;
pub mod context;
pub mod coordinator;
pub mod db;
pub mod errors;
pub mod manager;
pub mod migrations;
pub mod repo;

pub use config::{StoreConfig, StoreLocation, StoreOptions};
pub use context::{Context, Managed, ObjectState};
pub use coordinator::{ChangeSet, StoreCoordinator};
pub use errors::Result;
pub use manager::{PersistenceManager, PersistenceManagerBuilder};
pub use repo::{ImportSummary, Repository};
