use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::EntityDescription;
use crate::entity::Entity;
use crate::errors::{RecordSyncError, Result};

/// The merged schema of every entity the application stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectModel {
    entities: BTreeMap<String, EntityDescription>,
}

impl ObjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the description declared by an entity type
    ///
    /// # Errors
    ///
    /// Returns `ModelConflict` if a different description is already registered
    /// under the same name.
    pub fn register<T: Entity>(self) -> Result<Self> {
        self.with_entity(T::description())
    }

    /// Add an entity description
    ///
    /// Re-adding an identical description is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ModelConflict` if the name is taken by a different description.
    pub fn with_entity(mut self, description: EntityDescription) -> Result<Self> {
        match self.entities.get(&description.name) {
            Some(existing) if existing != &description => {
                Err(RecordSyncError::ConflictingEntity {
                    entity: description.name,
                }
                .into())
            }
            Some(_) => Ok(self),
            None => {
                self.entities.insert(description.name.clone(), description);
                Ok(self)
            }
        }
    }

    /// Merge several models into one
    ///
    /// # Errors
    ///
    /// Returns `ModelConflict` if two models describe the same entity differently.
    pub fn merge<I>(models: I) -> Result<Self>
    where
        I: IntoIterator<Item = ObjectModel>,
    {
        let mut merged = ObjectModel::new();
        for model in models {
            for description in model.entities.into_values() {
                merged = merged.with_entity(description)?;
            }
        }
        Ok(merged)
    }

    /// Load a model from its JSON representation
    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: ObjectModel = serde_json::from_str(json)?;
        Ok(model)
    }

    /// Look up an entity description by name
    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.get(name)
    }

    /// Look up an entity description, reporting unknown names as errors
    pub fn require_entity(&self, name: &str) -> Result<&EntityDescription> {
        self.entity(name).ok_or_else(|| {
            RecordSyncError::UnknownEntity {
                entity: name.to_string(),
            }
            .into()
        })
    }

    /// Entity names in sorted order
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// SHA-256 over the canonical JSON form of the model
    ///
    /// Stable across processes: entities are keyed in sorted order and
    /// attributes keep declaration order.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(&self.entities).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}
