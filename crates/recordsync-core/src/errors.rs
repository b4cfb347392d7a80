use recordsync_core_types::{ObjectId, RemoteId};
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Payload
    InvalidPayload,
    MissingField,
    InvalidRemoteId,

    // Object model
    UnknownEntity,
    ModelConflict,
    /// The store was written with a different object model and auto-migration is off
    ModelMismatch,

    // Context / save
    ValidationFailed,
    NotFound,
    EntityMismatch,
    ReadOnly,

    // Configuration
    Configuration,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Concurrency,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidPayload => "ERR_INVALID_PAYLOAD",
            ExErrorKind::MissingField => "ERR_MISSING_FIELD",
            ExErrorKind::InvalidRemoteId => "ERR_INVALID_REMOTE_ID",
            ExErrorKind::UnknownEntity => "ERR_UNKNOWN_ENTITY",
            ExErrorKind::ModelConflict => "ERR_MODEL_CONFLICT",
            ExErrorKind::ModelMismatch => "ERR_MODEL_MISMATCH",
            ExErrorKind::ValidationFailed => "ERR_VALIDATION_FAILED",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::EntityMismatch => "ERR_ENTITY_MISMATCH",
            ExErrorKind::ReadOnly => "ERR_READ_ONLY",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus the record
/// coordinates (entity, object id, remote id) the failure concerns.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    object_id: Option<ObjectId>,
    remote_id: Option<RemoteId>,
    message: String,
    source: Option<Box<ExError>>,
    violations: Option<Vec<String>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            object_id: None,
            remote_id: None,
            message: String::new(),
            source: None,
            violations: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity name context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add object id context
    pub fn with_object_id(mut self, object_id: ObjectId) -> Self {
        self.object_id = Some(object_id);
        self
    }

    /// Add remote id context
    pub fn with_remote_id(mut self, remote_id: RemoteId) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Add the individual schema violations behind a ValidationFailed error
    pub fn with_violations(mut self, violations: Vec<String>) -> Self {
        self.violations = Some(violations);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn object_id(&self) -> Option<&ObjectId> {
        self.object_id.as_ref()
    }

    pub fn remote_id(&self) -> Option<&RemoteId> {
        self.remote_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get the schema violations, if any (populated on ValidationFailed)
    pub fn violations(&self) -> Option<&[String]> {
        self.violations.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(object_id) = &self.object_id {
            write!(f, " (object_id: {})", object_id)?;
        }
        if let Some(remote_id) = &self.remote_id {
            write!(f, " (remote_id: {})", remote_id)?;
        }
        if let Some(violations) = &self.violations {
            write!(f, " [{}]", violations.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the object model, payload decoding and contexts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordSyncError {
    // ===== Object model =====
    /// Entity name is not part of the object model
    #[error("Entity not found in object model: {entity}")]
    UnknownEntity { entity: String },

    /// Two models describe the same entity differently
    #[error("Conflicting descriptions for entity: {entity}")]
    ConflictingEntity { entity: String },

    /// Stored model fingerprint differs from the current model
    #[error("Store was created with model {stored}, current model is {current}")]
    ModelMismatch { stored: String, current: String },

    // ===== Payload decoding =====
    /// Payload is not a JSON object
    #[error("Payload for {entity} is not an object")]
    PayloadNotObject { entity: String },

    /// Payload has no value at the remote id key path
    #[error("Payload for {entity} has no remote id at '{key_path}'")]
    MissingRemoteId { entity: String, key_path: String },

    /// Remote id value is neither text nor an integer
    #[error("Payload for {entity} has an unusable remote id at '{key_path}': {found}")]
    InvalidRemoteId {
        entity: String,
        key_path: String,
        found: String,
    },

    /// Payload fields could not be decoded into the entity's field type
    #[error("Payload for {entity} could not be decoded: {message}")]
    PayloadDecode { entity: String, message: String },

    // ===== Context / save =====
    /// Object failed schema validation at save time
    #[error("Validation failed for {entity} {object_id}")]
    ValidationFailed {
        entity: String,
        object_id: ObjectId,
        violations: Vec<String>,
    },

    /// Object is not registered in the context
    #[error("Object not registered in context: {object_id}")]
    ObjectNotRegistered { object_id: ObjectId },

    /// Object belongs to a different entity than requested
    #[error("Object {object_id} is a {actual}, not a {expected}")]
    EntityMismatch {
        object_id: ObjectId,
        expected: String,
        actual: String,
    },

    /// Write attempted against a store opened read-only
    #[error("Store is read-only")]
    ReadOnlyStore,

    // ===== Configuration =====
    /// Store option name or value is not acceptable
    #[error("Invalid store option '{name}': {reason}")]
    InvalidStoreOption { name: String, reason: String },

    // ===== Serialization =====
    /// Record attributes could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Conversion from RecordSyncError to ExError
impl From<RecordSyncError> for ExError {
    fn from(err: RecordSyncError) -> Self {
        match err {
            RecordSyncError::UnknownEntity { entity } => ExError::new(ExErrorKind::UnknownEntity)
                .with_entity(entity)
                .with_message("Entity not found in object model"),

            RecordSyncError::ConflictingEntity { entity } => {
                ExError::new(ExErrorKind::ModelConflict)
                    .with_entity(entity)
                    .with_op("merge_models")
                    .with_message("Entity described differently by two models")
            }

            RecordSyncError::ModelMismatch { stored, current } => {
                ExError::new(ExErrorKind::ModelMismatch)
                    .with_op("open_store")
                    .with_message(format!(
                        "Store model {} does not match current model {}",
                        stored, current
                    ))
            }

            RecordSyncError::PayloadNotObject { entity } => {
                ExError::new(ExErrorKind::InvalidPayload)
                    .with_entity(entity)
                    .with_op("decode_payload")
                    .with_message("Payload is not an object")
            }

            RecordSyncError::MissingRemoteId { entity, key_path } => {
                ExError::new(ExErrorKind::MissingField)
                    .with_entity(entity)
                    .with_op("decode_payload")
                    .with_message(format!("No remote id at '{}'", key_path))
            }

            RecordSyncError::InvalidRemoteId {
                entity,
                key_path,
                found,
            } => ExError::new(ExErrorKind::InvalidRemoteId)
                .with_entity(entity)
                .with_op("decode_payload")
                .with_message(format!("Unusable remote id at '{}': {}", key_path, found)),

            RecordSyncError::PayloadDecode { entity, message } => {
                ExError::new(ExErrorKind::InvalidPayload)
                    .with_entity(entity)
                    .with_op("decode_payload")
                    .with_message(message)
            }

            RecordSyncError::ValidationFailed {
                entity,
                object_id,
                violations,
            } => ExError::new(ExErrorKind::ValidationFailed)
                .with_entity(entity)
                .with_object_id(object_id)
                .with_op("save")
                .with_message("Object violates its entity description")
                .with_violations(violations),

            RecordSyncError::ObjectNotRegistered { object_id } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_object_id(object_id)
                    .with_message("Object not registered in context")
            }

            RecordSyncError::EntityMismatch {
                object_id,
                expected,
                actual,
            } => ExError::new(ExErrorKind::EntityMismatch)
                .with_object_id(object_id)
                .with_entity(actual.clone())
                .with_message(format!("Expected {}, found {}", expected, actual)),

            RecordSyncError::ReadOnlyStore => ExError::new(ExErrorKind::ReadOnly)
                .with_op("save")
                .with_message("Store is read-only"),

            RecordSyncError::InvalidStoreOption { name, reason } => {
                ExError::new(ExErrorKind::Configuration)
                    .with_op("store_options")
                    .with_message(format!("Invalid store option '{}': {}", name, reason))
            }

            RecordSyncError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to RecordSyncError
impl From<serde_json::Error> for RecordSyncError {
    fn from(err: serde_json::Error) -> Self {
        RecordSyncError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from serde_json::Error straight into the error facility
impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        RecordSyncError::from(err).into()
    }
}
