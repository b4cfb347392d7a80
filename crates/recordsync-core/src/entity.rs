//! Capability traits implemented by every stored record type
//!
//! `Entity` is the persisted base: a stable entity name, a schema and an
//! optional canonical ordering. `RemoteEntity` adds what a record mirrored
//! from a web service needs: where its remote id lives in a payload, how
//! payload fields map onto the record, and when a payload may overwrite it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{AttributeDescription, EntityDescription, SortDescriptor};
use crate::payload::RemotePayload;
use crate::sync::{self, SyncStamps};

/// A record type the store can persist
///
/// The serialized form of the value is its attribute map; it must match
/// `attributes()` for `save` to accept it.
pub trait Entity: Serialize + DeserializeOwned + Default + Clone {
    /// Stable name used for every lookup and stored with every row
    const ENTITY_NAME: &'static str;

    /// Declared attributes, in serialization order
    fn attributes() -> Vec<AttributeDescription>;

    /// Schema description registered in the object model
    fn description() -> EntityDescription {
        EntityDescription::new(Self::ENTITY_NAME).with_attributes(Self::attributes())
    }

    /// Canonical ordering of fetch results; none by default
    fn default_order() -> Vec<SortDescriptor> {
        Vec::new()
    }
}

/// A record type synced from a remote service
///
/// The remote id and the sync stamps are bookkeeping kept next to the value
/// (see `Managed` in the store), so implementors only map their own fields.
pub trait RemoteEntity: Entity {
    /// Typed view of the payload fields this record maps
    type Fields: DeserializeOwned;

    /// Payload key path holding the remote id (dots descend into objects)
    const REMOTE_ID_KEY_PATH: &'static str;

    /// Payload key holding the remote creation timestamp
    const CREATED_AT_KEY: &'static str = "created_at";

    /// Payload key holding the remote update timestamp
    const UPDATED_AT_KEY: &'static str = "updated_at";

    /// Map payload fields onto this record
    ///
    /// Sync stamps are applied by the repository before this runs.
    fn unpack(&mut self, payload: &RemotePayload<Self::Fields>);

    /// Decide whether `payload` may overwrite this record
    ///
    /// `current` are the record's stamps, `is_new` is true when the record
    /// was created by the lookup that produced it.
    fn should_unpack(
        &self,
        payload: &RemotePayload<Self::Fields>,
        current: &SyncStamps,
        is_new: bool,
    ) -> bool {
        sync::should_unpack(is_new, current, &payload.stamps)
    }
}
