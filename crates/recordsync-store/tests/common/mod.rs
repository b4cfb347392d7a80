// Shared fixtures for recordsync-store integration tests
#![allow(dead_code)]

use recordsync_core::{
    AttributeDescription, AttributeType, Entity, RemoteEntity, RemotePayload, SortDescriptor,
};
use recordsync_store::{PersistenceManager, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A user mirrored from a remote API, keyed by `id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserFields {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Entity for User {
    const ENTITY_NAME: &'static str = "User";

    fn attributes() -> Vec<AttributeDescription> {
        vec![
            AttributeDescription::required("name", AttributeType::String),
            AttributeDescription::optional("email", AttributeType::String),
        ]
    }

    fn default_order() -> Vec<SortDescriptor> {
        vec![SortDescriptor::ascending("name")]
    }
}

impl RemoteEntity for User {
    type Fields = UserFields;
    const REMOTE_ID_KEY_PATH: &'static str = "id";

    fn unpack(&mut self, payload: &RemotePayload<UserFields>) {
        self.name = payload.fields.name.clone();
        self.email = payload.fields.email.clone();
    }
}

/// A gist whose id is nested under `meta` and whose update stamp is `modified`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gist {
    pub description: String,
    pub public: bool,
}

#[derive(Debug, Deserialize)]
pub struct GistFields {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
}

impl Entity for Gist {
    const ENTITY_NAME: &'static str = "Gist";

    fn attributes() -> Vec<AttributeDescription> {
        vec![
            AttributeDescription::required("description", AttributeType::String),
            AttributeDescription::required("public", AttributeType::Boolean),
        ]
    }
}

impl RemoteEntity for Gist {
    type Fields = GistFields;
    const REMOTE_ID_KEY_PATH: &'static str = "meta.id";
    const UPDATED_AT_KEY: &'static str = "modified";

    fn unpack(&mut self, payload: &RemotePayload<GistFields>) {
        self.description = payload.fields.description.clone().unwrap_or_default();
        self.public = payload.fields.public;
    }
}

/// A local-only entity whose default value does not validate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub title: String,
    pub starts_at: String,
}

impl Entity for Meeting {
    const ENTITY_NAME: &'static str = "Meeting";

    fn attributes() -> Vec<AttributeDescription> {
        vec![
            AttributeDescription::required("title", AttributeType::String),
            AttributeDescription::required("starts_at", AttributeType::Date),
        ]
    }
}

/// Manager over a private in-memory store with every fixture registered
pub fn in_memory_manager() -> PersistenceManager {
    PersistenceManager::builder()
        .config(StoreConfig::in_memory())
        .register::<User>()
        .register::<Gist>()
        .register::<Meeting>()
        .open()
        .expect("in-memory store should open")
}

/// Manager over an on-disk store at `path`
pub fn file_manager(path: &Path) -> PersistenceManager {
    PersistenceManager::builder()
        .config(StoreConfig::new("recordsync-tests").with_store_path(path))
        .register::<User>()
        .register::<Gist>()
        .register::<Meeting>()
        .open()
        .expect("file store should open")
}
