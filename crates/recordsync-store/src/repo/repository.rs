//! Typed repository over one entity type
//!
//! Every operation comes in two flavours: `*_in` runs against a context the
//! caller supplies, the plain name runs against the manager's main context.
//!
//! For remote entities the repository implements find-or-create by remote id
//! and payload reconciliation:
//!
//! 1. decode the payload into `RemotePayload<T::Fields>`
//! 2. look the remote id up in the context, then the store
//! 3. on a miss, insert a fresh object carrying that remote id
//! 4. if `should_unpack` agrees, absorb the payload stamps and call `unpack`

#![allow(clippy::result_large_err)]

use std::marker::PhantomData;

use recordsync_core::payload::{decode, remote_id_of};
use recordsync_core::{
    log_op_end, log_op_error, log_op_start, Entity, EntityDescription, ExError, ObjectId,
    RemoteEntity, RemoteId, RemotePayload, UnpackOutcome,
};
use serde_json::Value;
use tracing::debug;

use crate::context::{Context, Managed};
use crate::errors::Result;
use crate::manager::PersistenceManager;

/// Outcome counts of a batch import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ImportSummary {
    pub fn record(&mut self, outcome: UnpackOutcome) {
        match outcome {
            UnpackOutcome::Created => self.created += 1,
            UnpackOutcome::Updated => self.updated += 1,
            UnpackOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// Typed access to the objects of entity `T`
pub struct Repository<'m, T> {
    manager: &'m PersistenceManager,
    description: EntityDescription,
    _entity: PhantomData<fn() -> T>,
}

impl<'m, T: Entity> Repository<'m, T> {
    /// Bind `T` to the manager's object model
    ///
    /// # Errors
    ///
    /// `UnknownEntity` if the model has no entity named `T::ENTITY_NAME`.
    pub fn new(manager: &'m PersistenceManager) -> Result<Self> {
        let description = manager.model().require_entity(T::ENTITY_NAME)?.clone();
        Ok(Self {
            manager,
            description,
            _entity: PhantomData,
        })
    }

    /// Entity description of `T` in the attached model
    pub fn entity(&self) -> &EntityDescription {
        &self.description
    }

    fn with_main<R>(&self, f: impl FnOnce(&mut Context) -> Result<R>) -> Result<R> {
        let mut context = self.manager.main_context()?;
        f(&mut context)
    }

    /// New transient object, pending insert in `context`
    pub fn insert_new_in(&self, context: &mut Context) -> Result<Managed<T>> {
        context.insert(T::default())
    }

    pub fn insert_new(&self) -> Result<Managed<T>> {
        self.with_main(|context| self.insert_new_in(context))
    }

    pub fn get_in(&self, context: &Context, object_id: &ObjectId) -> Result<Option<Managed<T>>> {
        context.get(object_id)
    }

    pub fn get(&self, object_id: &ObjectId) -> Result<Option<Managed<T>>> {
        self.with_main(|context| self.get_in(context, object_id))
    }

    /// Every object of `T`, in `T::default_order()`
    pub fn fetch_all_in(&self, context: &Context) -> Result<Vec<Managed<T>>> {
        context.fetch(&T::default_order())
    }

    pub fn fetch_all(&self) -> Result<Vec<Managed<T>>> {
        self.with_main(|context| self.fetch_all_in(context))
    }

    pub fn count_in(&self, context: &Context) -> Result<usize> {
        context.count(T::ENTITY_NAME)
    }

    pub fn count(&self) -> Result<usize> {
        self.with_main(|context| self.count_in(context))
    }
}

impl<'m, T: RemoteEntity> Repository<'m, T> {
    /// Find by remote id, or create a new transient object
    ///
    /// The new object's remote id is left unset; callers assign it.
    pub fn object_with_remote_id_in(
        &self,
        context: &mut Context,
        remote_id: impl Into<RemoteId>,
    ) -> Result<Managed<T>> {
        let remote_id = remote_id.into();
        match context.find_by_remote_id::<T>(&remote_id)? {
            Some(object) => {
                debug!(entity = T::ENTITY_NAME, remote_id = %remote_id, found = true, "find_or_create");
                Ok(object)
            }
            None => {
                debug!(entity = T::ENTITY_NAME, remote_id = %remote_id, found = false, "find_or_create");
                self.insert_new_in(context)
            }
        }
    }

    pub fn object_with_remote_id(&self, remote_id: impl Into<RemoteId>) -> Result<Managed<T>> {
        self.with_main(|context| self.object_with_remote_id_in(context, remote_id))
    }

    /// Find by remote id; never creates
    pub fn existing_object_with_remote_id_in(
        &self,
        context: &Context,
        remote_id: impl Into<RemoteId>,
    ) -> Result<Option<Managed<T>>> {
        context.find_by_remote_id::<T>(&remote_id.into())
    }

    pub fn existing_object_with_remote_id(
        &self,
        remote_id: impl Into<RemoteId>,
    ) -> Result<Option<Managed<T>>> {
        self.with_main(|context| self.existing_object_with_remote_id_in(context, remote_id))
    }

    /// Find-or-create for a decoded payload, then unpack if allowed
    ///
    /// A newly created object always receives the payload's remote id, even
    /// when `should_unpack` declines, so the next lookup finds it. Errors
    /// carry the payload's remote id.
    pub fn reconcile_in(
        &self,
        context: &mut Context,
        payload: &RemotePayload<T::Fields>,
    ) -> Result<(Managed<T>, UnpackOutcome)> {
        self.reconcile(context, payload)
            .map_err(|e| e.with_remote_id(payload.remote_id.clone()))
    }

    fn reconcile(
        &self,
        context: &mut Context,
        payload: &RemotePayload<T::Fields>,
    ) -> Result<(Managed<T>, UnpackOutcome)> {
        let (mut object, is_new) = match context.find_by_remote_id::<T>(&payload.remote_id)? {
            Some(object) => (object, false),
            None => {
                let mut object = self.insert_new_in(context)?;
                object.remote_id = Some(payload.remote_id.clone());
                (object, true)
            }
        };

        let unpack = object.value.should_unpack(payload, &object.stamps, is_new);
        if unpack {
            object.stamps.absorb(&payload.stamps);
            object.value.unpack(payload);
        }
        if unpack || is_new {
            context.stage(&object)?;
        }

        let outcome = match (is_new, unpack) {
            (true, _) => UnpackOutcome::Created,
            (false, true) => UnpackOutcome::Updated,
            (false, false) => UnpackOutcome::Unchanged,
        };
        Ok((object, outcome))
    }

    /// Decode `payload`, find-or-create its object and unpack it if stale
    ///
    /// # Errors
    ///
    /// `InvalidPayload`, `MissingField` or `InvalidRemoteId` if the payload
    /// does not decode; nothing is created in that case.
    pub fn object_with_payload_in(&self, context: &mut Context, payload: &Value) -> Result<Managed<T>> {
        log_op_start!("object_with_payload", entity = T::ENTITY_NAME);
        let start = std::time::Instant::now();

        let (object, outcome) = decode::<T>(payload)
            .and_then(|decoded| self.reconcile_in(context, &decoded))
            .map_err(|e| {
                log_op_error!(
                    "object_with_payload",
                    e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity = T::ENTITY_NAME
                );
                e
            })?;

        log_op_end!(
            "object_with_payload",
            duration_ms = start.elapsed().as_millis() as u64,
            entity = T::ENTITY_NAME,
            remote_id = object.remote_id.as_ref().map(RemoteId::as_str).unwrap_or_default(),
            outcome = outcome.as_str()
        );
        Ok(object)
    }

    pub fn object_with_payload(&self, payload: &Value) -> Result<Managed<T>> {
        self.with_main(|context| self.object_with_payload_in(context, payload))
    }

    /// Look up the object a payload refers to; never creates or unpacks
    ///
    /// Only the remote id is read, so payloads with unexpected fields still
    /// resolve.
    pub fn existing_object_with_payload_in(
        &self,
        context: &Context,
        payload: &Value,
    ) -> Result<Option<Managed<T>>> {
        let remote_id = remote_id_of::<T>(payload)?;
        context.find_by_remote_id::<T>(&remote_id)
    }

    pub fn existing_object_with_payload(&self, payload: &Value) -> Result<Option<Managed<T>>> {
        self.with_main(|context| self.existing_object_with_payload_in(context, payload))
    }

    /// Reconcile a batch of payloads in order
    ///
    /// Stops at the first payload that fails to decode. Objects reconciled
    /// before it stay pending in `context`; roll back to discard them.
    pub fn import_payloads_in(&self, context: &mut Context, payloads: &[Value]) -> Result<ImportSummary> {
        log_op_start!(
            "import_payloads",
            entity = T::ENTITY_NAME,
            payloads = payloads.len() as u64
        );
        let start = std::time::Instant::now();

        let mut summary = ImportSummary::default();
        for (index, raw) in payloads.iter().enumerate() {
            let step = decode::<T>(raw).and_then(|decoded| self.reconcile_in(context, &decoded));
            match step {
                Ok((_, outcome)) => summary.record(outcome),
                Err(e) => {
                    let err = rejected_payload(T::ENTITY_NAME, index, payloads.len(), e);
                    log_op_error!(
                        "import_payloads",
                        err,
                        duration_ms = start.elapsed().as_millis() as u64,
                        entity = T::ENTITY_NAME
                    );
                    return Err(err);
                }
            }
        }

        log_op_end!(
            "import_payloads",
            duration_ms = start.elapsed().as_millis() as u64,
            entity = T::ENTITY_NAME,
            created = summary.created as u64,
            updated = summary.updated as u64,
            unchanged = summary.unchanged as u64
        );
        Ok(summary)
    }

    pub fn import_payloads(&self, payloads: &[Value]) -> Result<ImportSummary> {
        self.with_main(|context| self.import_payloads_in(context, payloads))
    }
}

/// Wrap the error of the payload that stopped an import, keeping its kind
fn rejected_payload(entity: &str, index: usize, total: usize, cause: ExError) -> ExError {
    let err = ExError::new(cause.kind())
        .with_op("import_payloads")
        .with_entity(entity)
        .with_message(format!("payload {} of {} rejected", index + 1, total));
    let err = match cause.remote_id() {
        Some(remote_id) => err.with_remote_id(remote_id.clone()),
        None => err,
    };
    err.with_source(cause)
}
