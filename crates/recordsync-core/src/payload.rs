//! Typed decoding of remote payloads
//!
//! Payloads arrive as loosely-typed JSON objects. Before any reconciliation
//! runs they are decoded into a `RemotePayload`: the normalised remote id,
//! the parsed sync stamps and the entity's own typed fields.

use recordsync_core_types::RemoteId;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::dates::parse_date;
use crate::entity::RemoteEntity;
use crate::errors::{RecordSyncError, Result};
use crate::sync::SyncStamps;

/// Validated intermediate form of one remote record
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePayload<F> {
    pub remote_id: RemoteId,
    pub stamps: SyncStamps,
    pub fields: F,
}

/// Where the reserved values live in a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadKeys<'a> {
    pub remote_id: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

impl PayloadKeys<'static> {
    /// Keys declared by a remote entity type
    pub fn of<T: RemoteEntity>() -> Self {
        Self {
            remote_id: T::REMOTE_ID_KEY_PATH,
            created_at: T::CREATED_AT_KEY,
            updated_at: T::UPDATED_AT_KEY,
        }
    }
}

/// Decode a payload for entity type `T`
pub fn decode<T: RemoteEntity>(payload: &Value) -> Result<RemotePayload<T::Fields>> {
    decode_with(T::ENTITY_NAME, payload, &PayloadKeys::of::<T>())
}

/// Decode a payload given explicit keys
///
/// # Errors
///
/// - `InvalidPayload` if the payload is not an object or its fields do not
///   decode into `F`
/// - `MissingField` if there is no remote id at the key path
/// - `InvalidRemoteId` if the remote id is neither text nor an integer
pub fn decode_with<F: DeserializeOwned>(
    entity: &str,
    payload: &Value,
    keys: &PayloadKeys<'_>,
) -> Result<RemotePayload<F>> {
    let object = payload
        .as_object()
        .ok_or_else(|| RecordSyncError::PayloadNotObject {
            entity: entity.to_string(),
        })?;

    let remote_id = extract_remote_id(entity, object, keys.remote_id)?;

    // Unparseable stamps are left unset rather than failing the decode
    let stamps = SyncStamps::new(
        lookup_key_path(object, keys.created_at).and_then(parse_date),
        lookup_key_path(object, keys.updated_at).and_then(parse_date),
    );

    let fields = F::deserialize(payload).map_err(|e| RecordSyncError::PayloadDecode {
        entity: entity.to_string(),
        message: e.to_string(),
    })?;

    Ok(RemotePayload {
        remote_id,
        stamps,
        fields,
    })
}

/// Read only the remote id of a payload
pub fn remote_id_of<T: RemoteEntity>(payload: &Value) -> Result<RemoteId> {
    let object = payload
        .as_object()
        .ok_or_else(|| RecordSyncError::PayloadNotObject {
            entity: T::ENTITY_NAME.to_string(),
        })?;
    extract_remote_id(T::ENTITY_NAME, object, T::REMOTE_ID_KEY_PATH)
}

/// Resolve a key path inside a JSON object
///
/// A key that literally contains dots wins over descending into nested
/// objects, so `{"a.b": 1}` and `{"a": {"b": 1}}` both answer `a.b`.
pub fn lookup_key_path<'v>(object: &'v Map<String, Value>, key_path: &str) -> Option<&'v Value> {
    if let Some(value) = object.get(key_path) {
        return Some(value);
    }

    let mut segments = key_path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn extract_remote_id(
    entity: &str,
    object: &Map<String, Value>,
    key_path: &str,
) -> Result<RemoteId> {
    let invalid = |found: &Value| RecordSyncError::InvalidRemoteId {
        entity: entity.to_string(),
        key_path: key_path.to_string(),
        found: found.to_string(),
    };

    match lookup_key_path(object, key_path) {
        None | Some(Value::Null) => Err(RecordSyncError::MissingRemoteId {
            entity: entity.to_string(),
            key_path: key_path.to_string(),
        }
        .into()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(RemoteId::new(s.clone())),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(RemoteId::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(RemoteId::from(u))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                        Ok(RemoteId::from(f as i64))
                    }
                    _ => Err(invalid(&Value::Number(n.clone())).into()),
                }
            }
        }
        Some(other) => Err(invalid(other).into()),
    }
}
