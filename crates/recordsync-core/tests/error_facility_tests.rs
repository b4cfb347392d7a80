use recordsync_core::errors::{ExError, ExErrorKind, RecordSyncError};
use recordsync_core::ObjectId;

#[test]
fn test_unknown_entity_verifiable_by_kind() {
    let err: ExError = RecordSyncError::UnknownEntity {
        entity: "Ghost".to_string(),
    }
    .into();

    assert_eq!(err.kind(), ExErrorKind::UnknownEntity);
    assert_eq!(err.code(), "ERR_UNKNOWN_ENTITY");
    assert_eq!(err.entity(), Some("Ghost"));
}

#[test]
fn test_validation_failure_carries_violations() {
    let object_id = ObjectId::new();
    let err: ExError = RecordSyncError::ValidationFailed {
        entity: "Gist".to_string(),
        object_id: object_id.clone(),
        violations: vec!["title: required attribute is missing".to_string()],
    }
    .into();

    assert_eq!(err.kind(), ExErrorKind::ValidationFailed);
    assert_eq!(err.op(), Some("save"));
    assert_eq!(err.object_id(), Some(&object_id));
    assert_eq!(
        err.violations(),
        Some(&["title: required attribute is missing".to_string()][..])
    );
    assert!(err.to_string().contains("title: required attribute is missing"));
}

#[test]
fn test_missing_remote_id_distinct_from_invalid_remote_id() {
    let missing: ExError = RecordSyncError::MissingRemoteId {
        entity: "User".to_string(),
        key_path: "id".to_string(),
    }
    .into();
    let invalid: ExError = RecordSyncError::InvalidRemoteId {
        entity: "User".to_string(),
        key_path: "id".to_string(),
        found: "true".to_string(),
    }
    .into();

    assert_eq!(missing.kind(), ExErrorKind::MissingField);
    assert_eq!(invalid.kind(), ExErrorKind::InvalidRemoteId);
    assert_ne!(missing.code(), invalid.code());
}

#[test]
fn test_serde_json_errors_map_to_serialization() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: ExError = json_err.into();
    assert_eq!(err.kind(), ExErrorKind::Serialization);
    assert!(!err.message().is_empty());
}

#[test]
fn test_error_codes_are_unique() {
    let kinds = [
        ExErrorKind::InvalidPayload,
        ExErrorKind::MissingField,
        ExErrorKind::InvalidRemoteId,
        ExErrorKind::UnknownEntity,
        ExErrorKind::ModelConflict,
        ExErrorKind::ModelMismatch,
        ExErrorKind::ValidationFailed,
        ExErrorKind::NotFound,
        ExErrorKind::EntityMismatch,
        ExErrorKind::ReadOnly,
        ExErrorKind::Configuration,
        ExErrorKind::Io,
        ExErrorKind::Serialization,
        ExErrorKind::Persistence,
        ExErrorKind::Concurrency,
    ];
    let mut codes: Vec<&str> = kinds.iter().map(|k| k.code()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), kinds.len());
}
