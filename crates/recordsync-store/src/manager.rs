//! Persistence manager
//!
//! Owns the object model, the attached store and the lazily built main
//! context. The store is attached eagerly by [`PersistenceManagerBuilder::open`];
//! the main context is only built on first request, so
//! [`PersistenceManager::has_main_context`] tells whether anything asked for it.

#![allow(clippy::result_large_err)]

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use recordsync_core::{
    log_op_end, log_op_error, log_op_start, Entity, EntityDescription, ObjectModel,
    RecordSyncError,
};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::config::{StoreConfig, StoreLocation, StoreOptions};
use crate::context::Context;
use crate::coordinator::StoreCoordinator;
use crate::db;
use crate::errors::{lock_poisoned, migration_required, Result};
use crate::migrations::{apply_migrations, is_initialised, pending_migrations};
use crate::repo::SqliteRepo;

/// `store_metadata` key holding the fingerprint of the attached object model
pub const MODEL_FINGERPRINT_KEY: &str = "model_fingerprint";

const MAIN_CONTEXT_NAME: &str = "main";

/// Collects configuration and object models before the store is attached
#[derive(Debug, Default)]
pub struct PersistenceManagerBuilder {
    config: StoreConfig,
    model: Option<ObjectModel>,
    bundled: Vec<ObjectModel>,
    registered: Vec<EntityDescription>,
}

impl PersistenceManagerBuilder {
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Use exactly this model, ignoring registered and bundled ones
    pub fn model(mut self, model: ObjectModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Add an entity type to the merged default model
    pub fn register<T: Entity>(mut self) -> Self {
        self.registered.push(T::description());
        self
    }

    /// Add a whole model to the merged default model
    pub fn bundle(mut self, model: ObjectModel) -> Self {
        self.bundled.push(model);
        self
    }

    /// Merge the models and attach the store
    ///
    /// # Errors
    ///
    /// - `ModelConflict` if two sources describe one entity differently
    /// - `ModelMismatch` if the store needs migrations or holds a different
    ///   model and `auto_migrate` is off
    /// - `Configuration`, `Io` or `Persistence` if the store cannot be opened
    pub fn open(self) -> Result<PersistenceManager> {
        let model = match self.model {
            Some(model) => model,
            None => {
                let mut registered = ObjectModel::new();
                for description in self.registered {
                    registered = registered.with_entity(description)?;
                }
                let mut models = self.bundled;
                models.push(registered);
                ObjectModel::merge(models)?
            }
        };
        PersistenceManager::open(self.config, model)
    }
}

/// Entry point of the persistence stack
#[derive(Debug)]
pub struct PersistenceManager {
    config: StoreConfig,
    model: Arc<ObjectModel>,
    coordinator: Arc<StoreCoordinator>,
    main: OnceLock<Mutex<Context>>,
}

impl PersistenceManager {
    pub fn builder() -> PersistenceManagerBuilder {
        PersistenceManagerBuilder::default()
    }

    /// Attach the store described by `config` under `model`
    pub fn open(config: StoreConfig, model: ObjectModel) -> Result<Self> {
        let location = config.location();
        log_op_start!(
            "open_store",
            location = %location,
            read_only = config.options.read_only
        );
        let start = std::time::Instant::now();

        let conn = attach(&location, &config.options, &model).map_err(|e| {
            log_op_error!(
                "open_store",
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "open_store",
            duration_ms = start.elapsed().as_millis() as u64,
            entities = model.entity_names().count() as u64
        );

        let read_only = config.options.read_only;
        Ok(Self {
            config,
            model: Arc::new(model),
            coordinator: Arc::new(StoreCoordinator::new(conn, location, read_only)),
            main: OnceLock::new(),
        })
    }

    /// The shared main context, built on first request
    ///
    /// Holding the guard blocks other users of the main context; drop it
    /// before calling another main-context operation on the same thread.
    pub fn main_context(&self) -> Result<MutexGuard<'_, Context>> {
        let main = self.main.get_or_init(|| {
            debug!(context = MAIN_CONTEXT_NAME, "building main context");
            Mutex::new(Context::new(
                MAIN_CONTEXT_NAME,
                self.coordinator.clone(),
                self.model.clone(),
            ))
        });
        main.lock().map_err(|_| lock_poisoned("main context"))
    }

    pub fn has_main_context(&self) -> bool {
        self.main.get().is_some()
    }

    /// A fresh context for background work, independent of the main one
    pub fn new_context(&self, name: impl Into<String>) -> Context {
        Context::new(name, self.coordinator.clone(), self.model.clone())
    }

    pub fn coordinator(&self) -> &StoreCoordinator {
        &self.coordinator
    }

    pub fn model(&self) -> &ObjectModel {
        &self.model
    }

    pub fn store_location(&self) -> &StoreLocation {
        self.coordinator.location()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Detach the store
    ///
    /// Unsaved changes of the main context are discarded. Contexts created
    /// with `new_context` keep the store alive until they are dropped.
    pub fn close(self) -> Result<()> {
        if let Some(main) = self.main.get() {
            let pending = main
                .lock()
                .map(|ctx| ctx.pending_count())
                .map_err(|_| lock_poisoned("main context"))?;
            if pending > 0 {
                warn!(pending = pending as u64, "closing with unsaved main context changes");
            }
        }
        self.coordinator.checkpoint()?;
        debug!(location = %self.coordinator.location(), "store closed");
        Ok(())
    }
}

fn attach(location: &StoreLocation, options: &StoreOptions, model: &ObjectModel) -> Result<Connection> {
    let mut conn = db::open(location, options)?;

    let pending = pending_migrations(&conn)?;
    if !pending.is_empty() {
        let fresh = !is_initialised(&conn)?;
        if options.read_only || !(options.auto_migrate || fresh) {
            return Err(migration_required(&pending));
        }
        let applied = apply_migrations(&mut conn)?;
        debug!(applied = applied.len() as u64, "store migrated");
    }

    check_model(&conn, model, options)?;
    Ok(conn)
}

/// Compare the model against the fingerprint recorded by the last open
fn check_model(conn: &Connection, model: &ObjectModel, options: &StoreOptions) -> Result<()> {
    let current = model.fingerprint();
    match SqliteRepo::get_metadata(conn, MODEL_FINGERPRINT_KEY)? {
        Some(stored) if stored == current => Ok(()),
        Some(stored) if options.auto_migrate && !options.read_only => {
            debug!(stored = %stored, current = %current, "object model changed");
            SqliteRepo::put_metadata(conn, MODEL_FINGERPRINT_KEY, &current)
        }
        Some(stored) => Err(RecordSyncError::ModelMismatch { stored, current }.into()),
        None if options.read_only => Ok(()),
        None => SqliteRepo::put_metadata(conn, MODEL_FINGERPRINT_KEY, &current),
    }
}
