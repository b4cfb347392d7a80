//! Repository layer
//!
//! `SqliteRepo` reads and writes rows, `hydration` converts rows to typed
//! managed objects and `Repository` is the typed per-entity surface.

pub mod hydration;
pub mod repository;
pub mod sqlite_repo;

pub use repository::{ImportSummary, Repository};
pub use sqlite_repo::{SqliteRepo, StoredRecord};
