//! Hydration layer
//!
//! Converts between untyped `StoredRecord` rows and typed `Managed<T>`
//! objects. The entity value round-trips through its serde form, which is
//! also the attribute map validated at save time.

#![allow(clippy::result_large_err)]

use recordsync_core::{Entity, RecordSyncError};
use serde_json::Value;

use crate::context::Managed;
use crate::errors::Result;
use crate::repo::StoredRecord;

/// Serialize a managed object into its row form
pub fn to_record<T: Entity>(managed: &Managed<T>) -> Result<StoredRecord> {
    let attributes = match serde_json::to_value(&managed.value)? {
        Value::Object(map) => map,
        other => {
            return Err(RecordSyncError::Serialization {
                message: format!(
                    "{} must serialize to an object, got {}",
                    T::ENTITY_NAME,
                    other
                ),
            }
            .into())
        }
    };

    Ok(StoredRecord {
        object_id: managed.object_id().clone(),
        entity: T::ENTITY_NAME.to_string(),
        remote_id: managed.remote_id.clone(),
        stamps: managed.stamps,
        attributes,
    })
}

/// Rebuild a typed object from its row
///
/// # Errors
///
/// `EntityMismatch` if the row belongs to another entity; `Serialization`
/// if its attributes no longer decode into `T`.
pub fn from_record<T: Entity>(record: StoredRecord) -> Result<Managed<T>> {
    if record.entity != T::ENTITY_NAME {
        return Err(RecordSyncError::EntityMismatch {
            object_id: record.object_id,
            expected: T::ENTITY_NAME.to_string(),
            actual: record.entity,
        }
        .into());
    }

    let value: T = serde_json::from_value(Value::Object(record.attributes))?;
    Ok(Managed::from_parts(
        record.object_id,
        record.remote_id,
        record.stamps,
        value,
    ))
}
