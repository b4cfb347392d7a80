// Integration tests for the persistence base: store attachment, contexts,
// validation and configuration

mod common;

use common::{file_manager, in_memory_manager, Gist, Meeting, User};
use recordsync_core::{
    AttributeDescription, AttributeType, Entity, EntityDescription, ExErrorKind, ObjectModel,
    RemoteId,
};
use recordsync_store::manager::MODEL_FINGERPRINT_KEY;
use recordsync_store::repo::SqliteRepo;
use recordsync_store::{PersistenceManager, Repository, StoreConfig, StoreLocation, StoreOptions};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_main_context_only_exists_once_requested() {
    let manager = in_memory_manager();
    assert!(!manager.has_main_context());

    // opening the repository does not touch the main context
    let users = Repository::<User>::new(&manager).unwrap();
    assert!(!manager.has_main_context());

    users.count().unwrap();
    assert!(manager.has_main_context());
}

#[test]
fn test_repository_for_unknown_entity_fails() {
    let manager = PersistenceManager::builder()
        .config(StoreConfig::in_memory())
        .register::<User>()
        .open()
        .unwrap();

    assert!(Repository::<User>::new(&manager).is_ok());
    let err = Repository::<Gist>::new(&manager).err().unwrap();
    assert_eq!(err.kind(), ExErrorKind::UnknownEntity);
    assert_eq!(err.entity(), Some("Gist"));
}

#[test]
fn test_entity_description_resolves_through_repository_and_context() {
    let manager = in_memory_manager();
    let users = Repository::<User>::new(&manager).unwrap();
    assert_eq!(users.entity(), &User::description());

    let ctx = manager.new_context("lookup");
    assert_eq!(ctx.entity_description("User").unwrap(), &User::description());
    assert_eq!(
        ctx.entity_description("Nope").unwrap_err().kind(),
        ExErrorKind::UnknownEntity
    );
}

#[test]
fn test_invalid_object_fails_save_and_stays_pending() {
    // Given: a meeting whose default start date is empty
    let manager = in_memory_manager();
    let meetings = Repository::<Meeting>::new(&manager).unwrap();
    let mut ctx = manager.new_context("calendar");
    let mut meeting = meetings.insert_new_in(&mut ctx).unwrap();
    meeting.title = "Standup".to_string();
    meeting.remote_id = Some(RemoteId::from("m-1"));
    ctx.stage(&meeting).unwrap();

    // When: saving
    let err = ctx.save().unwrap_err();

    // Then: validation names the offending attribute and nothing is written
    assert_eq!(err.kind(), ExErrorKind::ValidationFailed);
    assert_eq!(err.entity(), Some("Meeting"));
    assert_eq!(err.object_id(), Some(meeting.object_id()));
    assert_eq!(err.remote_id(), Some(&RemoteId::from("m-1")));
    assert!(err.violations().unwrap()[0].starts_with("starts_at"));
    assert!(ctx.has_changes());
    assert_eq!(meetings.count_in(&manager.new_context("other")).unwrap(), 0);

    // When: the object is fixed and saved again
    meeting.starts_at = "2024-03-01T09:00:00+01:00".to_string();
    meeting.save(&mut ctx).unwrap();

    // Then: it is persisted
    assert!(!ctx.has_changes());
    assert_eq!(meetings.count_in(&manager.new_context("other")).unwrap(), 1);
}

#[test]
fn test_default_order_applies_to_fetch_all() {
    let manager = in_memory_manager();
    let users = Repository::<User>::new(&manager).unwrap();
    for (id, name) in [("1", "Mallory"), ("2", "Alice"), ("3", "Trent")] {
        users
            .object_with_payload(&json!({"id": id, "name": name}))
            .unwrap();
    }
    manager.main_context().unwrap().save().unwrap();

    let names: Vec<String> = users
        .fetch_all()
        .unwrap()
        .into_iter()
        .map(|u| u.value.name)
        .collect();
    assert_eq!(names, vec!["Alice", "Mallory", "Trent"]);
}

#[test]
fn test_get_and_delete_by_object_id() {
    let manager = in_memory_manager();
    let users = Repository::<User>::new(&manager).unwrap();
    let created = users
        .object_with_payload(&json!({"id": "9", "name": "Eve"}))
        .unwrap();
    manager.main_context().unwrap().save().unwrap();

    assert_eq!(users.get(created.object_id()).unwrap().unwrap().name, "Eve");

    {
        let mut main = manager.main_context().unwrap();
        main.delete(created.object_id()).unwrap();
        main.save().unwrap();
    }
    assert!(users.get(created.object_id()).unwrap().is_none());
    assert!(users.existing_object_with_remote_id("9").unwrap().is_none());
}

#[test]
fn test_objects_survive_reopen() {
    // Given: a user saved to an on-disk store
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite");
    {
        let manager = file_manager(&path);
        let users = Repository::<User>::new(&manager).unwrap();
        users
            .object_with_payload(
                &json!({"id": "42", "name": "Alice", "updated_at": "2014-01-01T00:00:00.123Z"}),
            )
            .unwrap();
        manager.main_context().unwrap().save().unwrap();
        manager.close().unwrap();
    }

    // When: the store is opened again
    let manager = file_manager(&path);
    let users = Repository::<User>::new(&manager).unwrap();

    // Then: the object and its stamps are intact
    let alice = users.existing_object_with_remote_id("42").unwrap().unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(
        alice.stamps.updated_at.map(|d| d.timestamp_millis()),
        Some(1_388_534_400_123)
    );
    assert_eq!(manager.store_location(), &StoreLocation::File(path));
}

#[test]
fn test_read_only_store_rejects_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite");
    file_manager(&path).close().unwrap();

    let manager = PersistenceManager::builder()
        .config(
            StoreConfig::new("recordsync-tests")
                .with_store_path(&path)
                .with_options(StoreOptions::default().read_only(true)),
        )
        .register::<User>()
        .register::<Gist>()
        .register::<Meeting>()
        .open()
        .unwrap();
    let users = Repository::<User>::new(&manager).unwrap();

    // reads work
    assert_eq!(users.count().unwrap(), 0);

    // an empty save is fine, a real one is refused
    manager.main_context().unwrap().save().unwrap();
    users
        .object_with_payload(&json!({"id": "1", "name": "Ada"}))
        .unwrap();
    let err = manager.main_context().unwrap().save().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ReadOnly);
}

#[test]
fn test_changed_model_requires_auto_migrate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite");
    file_manager(&path).close().unwrap();

    let changed = ObjectModel::new()
        .with_entity(
            EntityDescription::new("User")
                .with_attribute(AttributeDescription::required("handle", AttributeType::String)),
        )
        .unwrap();

    // Without auto_migrate the changed model is refused
    let strict = StoreConfig::new("recordsync-tests")
        .with_store_path(&path)
        .with_options(StoreOptions::default().auto_migrate(false));
    let err = PersistenceManager::open(strict, changed.clone()).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ModelMismatch);

    // With it, the new fingerprint is recorded
    let relaxed = StoreConfig::new("recordsync-tests").with_store_path(&path);
    let manager = PersistenceManager::open(relaxed, changed.clone()).unwrap();
    let conn = rusqlite::Connection::open(&path).unwrap();
    assert_eq!(
        SqliteRepo::get_metadata(&conn, MODEL_FINGERPRINT_KEY).unwrap(),
        Some(changed.fingerprint())
    );
    manager.close().unwrap();
}

#[test]
fn test_fresh_store_initialises_without_auto_migrate() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new("recordsync-tests")
        .with_store_path(dir.path().join("fresh.sqlite"))
        .with_options(StoreOptions::default().auto_migrate(false));

    let manager = PersistenceManager::builder()
        .config(config)
        .register::<User>()
        .open()
        .unwrap();
    assert_eq!(Repository::<User>::new(&manager).unwrap().count().unwrap(), 0);
}

#[test]
fn test_config_file_drives_open() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("from-config.sqlite");
    let config_path = dir.path().join("recordsync.toml");
    std::fs::write(
        &config_path,
        format!(
            "app_name = \"gistpad\"\nstore_path = {:?}\n\n[options.pragmas]\nsynchronous = \"NORMAL\"\n",
            store_path.display().to_string()
        ),
    )
    .unwrap();

    let config = StoreConfig::load(&config_path).unwrap();
    assert_eq!(config.app_name, "gistpad");

    let manager = PersistenceManager::builder()
        .config(config)
        .register::<User>()
        .open()
        .unwrap();
    assert_eq!(manager.store_location(), &StoreLocation::File(store_path.clone()));
    manager.close().unwrap();
    assert!(store_path.exists());
}

#[test]
fn test_missing_config_file_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let err = StoreConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Configuration);
}
