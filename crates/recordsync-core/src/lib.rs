//! recordsync core - object model, entity traits and reconciliation policy
//!
//! This crate provides the storage-independent half of recordsync:
//! - Error facility (`ExError`, `ExErrorKind`) and domain errors
//! - Structured logging facility
//! - Object model: entity descriptions, merged models, sort descriptors
//! - `Entity` / `RemoteEntity` capability traits
//! - Typed payload decoding, date parsing and the last-writer-wins policy

pub mod dates;
pub mod entity;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod payload;
pub mod sync;

pub use recordsync_core_types as core_types;
#[doc(hidden)]
pub use tracing;

// Re-export commonly used types
pub use dates::{format_date, parse_date};
pub use entity::{Entity, RemoteEntity};
pub use errors::{ExError, ExErrorKind, RecordSyncError, Result};
pub use model::{AttributeDescription, AttributeType, EntityDescription, ObjectModel, SortDescriptor};
pub use payload::RemotePayload;
pub use recordsync_core_types::{ContextId, ObjectId, RemoteId};
pub use sync::{Freshness, SyncStamps, UnpackOutcome};
