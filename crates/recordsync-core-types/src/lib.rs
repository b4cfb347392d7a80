//! Core types shared across recordsync facilities
//!
//! This crate provides foundational types used by the error facility,
//! the logging facility and the store:
//!
//! - **Identifiers**: ObjectId, RemoteId, ContextId
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;

pub use ids::{ContextId, ObjectId, RemoteId};
