//! Managed objects and object contexts
//!
//! A `Context` is a scratchpad of pending changes over the shared store.
//! Objects handed out by a context are detached typed copies (`Managed<T>`);
//! edits reach the context through `stage` and the store through `save`.
//! Until `save` succeeds nothing a context holds is visible to other
//! contexts, and `rollback` discards it.

#![allow(clippy::result_large_err)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use recordsync_core::model::compare_values;
use recordsync_core::{
    log_op_end, log_op_error, log_op_start, ContextId, Entity, EntityDescription, ExError,
    ObjectId, ObjectModel, RecordSyncError, RemoteId, SortDescriptor, SyncStamps,
};
use serde_json::Value;

use crate::coordinator::{ChangeSet, StoreCoordinator};
use crate::errors::Result;
use crate::repo::hydration::{from_record, to_record};
use crate::repo::StoredRecord;

/// A typed object plus the bookkeeping the store keeps for it
///
/// Dereferences to the entity value, so fields read and write directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Managed<T> {
    object_id: ObjectId,
    /// Identifier on the remote service, if the object mirrors one
    pub remote_id: Option<RemoteId>,
    /// Remote creation / update timestamps last absorbed from a payload
    pub stamps: SyncStamps,
    pub value: T,
}

impl<T> Managed<T> {
    /// Wrap a value under a fresh object id, outside any context
    pub fn new(value: T) -> Self {
        Self::from_parts(ObjectId::new(), None, SyncStamps::default(), value)
    }

    pub(crate) fn from_parts(
        object_id: ObjectId,
        remote_id: Option<RemoteId>,
        stamps: SyncStamps,
        value: T,
    ) -> Self {
        Self {
            object_id,
            remote_id,
            stamps,
            value,
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Entity> Managed<T> {
    /// Stage this object in `context` and save the context
    ///
    /// Saves every pending change of the context, not only this object.
    pub fn save(&self, context: &mut Context) -> Result<()> {
        context.stage(self)?;
        context.save()
    }
}

impl<T> Deref for Managed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Managed<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Where an object stands relative to the store, as seen by one context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Created in this context, not yet saved
    Inserted,
    /// Persisted, with staged changes
    Updated,
    /// Persisted, marked for deletion
    Deleted,
    /// Persisted, no pending change in this context
    Persisted,
}

#[derive(Debug, Clone)]
struct Pending {
    record: StoredRecord,
    state: ObjectState,
    seq: u64,
}

/// A unit of work over the shared store
#[derive(Debug)]
pub struct Context {
    id: ContextId,
    name: String,
    coordinator: Arc<StoreCoordinator>,
    model: Arc<ObjectModel>,
    pending: HashMap<ObjectId, Pending>,
    next_seq: u64,
}

impl Context {
    pub(crate) fn new(
        name: impl Into<String>,
        coordinator: Arc<StoreCoordinator>,
        model: Arc<ObjectModel>,
    ) -> Self {
        Self {
            id: ContextId::new(),
            name: name.into(),
            coordinator,
            model,
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &ObjectModel {
        &self.model
    }

    /// Description of `entity` in the attached object model
    pub fn entity_description(&self, entity: &str) -> Result<&EntityDescription> {
        self.model.require_entity(entity)
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// State of an object as this context sees it; `None` if it exists
    /// neither here nor in the store
    pub fn object_state(&self, object_id: &ObjectId) -> Result<Option<ObjectState>> {
        if let Some(pending) = self.pending.get(object_id) {
            return Ok(Some(pending.state));
        }
        Ok(self
            .coordinator
            .get(object_id)?
            .map(|_| ObjectState::Persisted))
    }

    /// Create a new object of `T` in this context
    ///
    /// # Errors
    ///
    /// `UnknownEntity` if `T` is not part of the object model.
    pub fn insert<T: Entity>(&mut self, value: T) -> Result<Managed<T>> {
        self.model.require_entity(T::ENTITY_NAME)?;

        let managed = Managed::new(value);
        let record = to_record(&managed)?;
        self.track(record, ObjectState::Inserted);
        Ok(managed)
    }

    /// Record the current state of `object` as a pending change
    ///
    /// Objects read from the store are adopted here on first stage.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object is neither pending in this context nor
    /// persisted; `EntityMismatch` if its object id belongs to another entity.
    pub fn stage<T: Entity>(&mut self, object: &Managed<T>) -> Result<()> {
        let record = to_record(object)?;

        if let Some(pending) = self.pending.get_mut(object.object_id()) {
            ensure_entity(&record.object_id, T::ENTITY_NAME, &pending.record.entity)?;
            pending.record = record;
            if pending.state == ObjectState::Deleted {
                pending.state = ObjectState::Updated;
            }
            return Ok(());
        }

        let stored = self
            .coordinator
            .get(object.object_id())?
            .ok_or_else(|| RecordSyncError::ObjectNotRegistered {
                object_id: object.object_id().clone(),
            })?;
        ensure_entity(&record.object_id, T::ENTITY_NAME, &stored.entity)?;
        self.track(record, ObjectState::Updated);
        Ok(())
    }

    /// Mark an object for deletion
    ///
    /// Deleting an object inserted in this context simply forgets it.
    pub fn delete(&mut self, object_id: &ObjectId) -> Result<()> {
        match self.pending.get(object_id).map(|p| p.state) {
            Some(ObjectState::Inserted) => {
                self.pending.remove(object_id);
                return Ok(());
            }
            Some(_) => {
                if let Some(pending) = self.pending.get_mut(object_id) {
                    pending.state = ObjectState::Deleted;
                }
                return Ok(());
            }
            None => {}
        }

        let stored =
            self.coordinator
                .get(object_id)?
                .ok_or_else(|| RecordSyncError::ObjectNotRegistered {
                    object_id: object_id.clone(),
                })?;
        self.track(stored, ObjectState::Deleted);
        Ok(())
    }

    /// Discard every pending change
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    /// Look up an object by id, pending changes first
    pub fn get<T: Entity>(&self, object_id: &ObjectId) -> Result<Option<Managed<T>>> {
        if let Some(pending) = self.pending.get(object_id) {
            return match pending.state {
                ObjectState::Deleted => Ok(None),
                _ => from_record(pending.record.clone()).map(Some),
            };
        }
        self.coordinator
            .get(object_id)?
            .map(from_record)
            .transpose()
    }

    /// First object of `T` carrying `remote_id`
    ///
    /// Objects pending in this context are searched first, in the order they
    /// were staged, then the store in insertion order.
    pub fn find_by_remote_id<T: Entity>(&self, remote_id: &RemoteId) -> Result<Option<Managed<T>>> {
        let local = self
            .pending
            .values()
            .filter(|p| p.state != ObjectState::Deleted)
            .filter(|p| p.record.entity == T::ENTITY_NAME)
            .filter(|p| p.record.remote_id.as_ref() == Some(remote_id))
            .min_by_key(|p| p.seq);
        if let Some(pending) = local {
            return from_record(pending.record.clone()).map(Some);
        }

        // rows pending here were re-keyed or deleted; later duplicates still count
        self.coordinator
            .find_by_remote_id(T::ENTITY_NAME, remote_id)?
            .into_iter()
            .find(|stored| !self.pending.contains_key(&stored.object_id))
            .map(from_record)
            .transpose()
    }

    /// Every object of `T`, as this context sees them, sorted by `order`
    ///
    /// Without an order, persisted objects come first in insertion order,
    /// followed by objects inserted in this context.
    pub fn fetch<T: Entity>(&self, order: &[SortDescriptor]) -> Result<Vec<Managed<T>>> {
        self.fetch_records(T::ENTITY_NAME, order)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// Number of objects of `entity` as this context sees them
    pub fn count(&self, entity: &str) -> Result<usize> {
        if !self.pending.values().any(|p| p.record.entity == entity) {
            return self.coordinator.count(entity);
        }
        Ok(self.fetch_records(entity, &[])?.len())
    }

    fn fetch_records(&self, entity: &str, order: &[SortDescriptor]) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        for stored in self.coordinator.list(entity)? {
            match self.pending.get(&stored.object_id) {
                Some(pending) if pending.state == ObjectState::Deleted => {}
                Some(pending) => records.push(pending.record.clone()),
                None => records.push(stored),
            }
        }

        let mut inserted: Vec<&Pending> = self
            .pending
            .values()
            .filter(|p| p.state == ObjectState::Inserted && p.record.entity == entity)
            .collect();
        inserted.sort_by_key(|p| p.seq);
        records.extend(inserted.into_iter().map(|p| p.record.clone()));

        if !order.is_empty() {
            records.sort_by(|a, b| compare_records(a, b, order));
        }
        Ok(records)
    }

    /// Validate and commit every pending change in one transaction
    ///
    /// On failure the pending changes are kept, so the caller can fix them
    /// and retry, or roll back.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for the first object violating its description
    /// - `ReadOnly` if the store was opened read-only
    /// - `Persistence` if the transaction fails
    pub fn save(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        log_op_start!(
            "save",
            context_id = %self.id,
            pending = self.pending.len() as u64
        );
        let start = std::time::Instant::now();

        let changes = self.change_set().and_then(|changes| {
            self.coordinator.commit(&changes)?;
            Ok(changes)
        });
        let changes = changes.map_err(|e| {
            log_op_error!(
                "save",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                context_id = %self.id
            );
            e
        })?;

        self.pending.clear();

        log_op_end!(
            "save",
            duration_ms = start.elapsed().as_millis() as u64,
            context_id = %self.id,
            inserted = changes.inserts.len() as u64,
            updated = changes.updates.len() as u64,
            deleted = changes.deletes.len() as u64
        );
        Ok(())
    }

    fn change_set(&self) -> Result<ChangeSet> {
        let mut ordered: Vec<&Pending> = self.pending.values().collect();
        ordered.sort_by_key(|p| p.seq);

        let mut changes = ChangeSet::default();
        for pending in ordered {
            match pending.state {
                ObjectState::Inserted => {
                    self.validate(&pending.record)?;
                    changes.inserts.push(pending.record.clone());
                }
                ObjectState::Updated => {
                    self.validate(&pending.record)?;
                    changes.updates.push(pending.record.clone());
                }
                ObjectState::Deleted => changes.deletes.push(pending.record.object_id.clone()),
                ObjectState::Persisted => {}
            }
        }
        Ok(changes)
    }

    fn validate(&self, record: &StoredRecord) -> Result<()> {
        let description = self.model.require_entity(&record.entity)?;
        let violations = description.validate(&record.attributes);
        if violations.is_empty() {
            return Ok(());
        }
        let err: ExError = RecordSyncError::ValidationFailed {
            entity: record.entity.clone(),
            object_id: record.object_id.clone(),
            violations,
        }
        .into();
        Err(match &record.remote_id {
            Some(remote_id) => err.with_remote_id(remote_id.clone()),
            None => err,
        })
    }

    fn track(&mut self, record: StoredRecord, state: ObjectState) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending
            .insert(record.object_id.clone(), Pending { record, state, seq });
    }
}

fn ensure_entity(object_id: &ObjectId, expected: &str, actual: &str) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RecordSyncError::EntityMismatch {
            object_id: object_id.clone(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into())
    }
}

/// Sort key of a record: declared attributes first, then bookkeeping
fn sort_value(record: &StoredRecord, key: &str) -> Option<Value> {
    if let Some(value) = record.attributes.get(key) {
        return Some(value.clone());
    }
    match key {
        "remote_id" => record
            .remote_id
            .as_ref()
            .map(|id| Value::String(id.as_str().to_string())),
        "created_at" => record.stamps.created_at.map(|d| d.timestamp_millis().into()),
        "updated_at" => record.stamps.updated_at.map(|d| d.timestamp_millis().into()),
        _ => None,
    }
}

fn compare_records(a: &StoredRecord, b: &StoredRecord, order: &[SortDescriptor]) -> Ordering {
    for descriptor in order {
        let ordering = compare_values(
            sort_value(a, &descriptor.key).as_ref(),
            sort_value(b, &descriptor.key).as_ref(),
        );
        let ordering = descriptor.direct(ordering);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
