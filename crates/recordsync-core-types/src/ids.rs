//! Identifier types for managed records
//!
//! `ObjectId` is the store-assigned identity of a managed object,
//! `RemoteId` is the identifier a web service uses for the same record,
//! and `ContextId` tags an execution context in log output.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned identity of a managed object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a new time-ordered ObjectId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for rows read back from the store)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a record in the remote service
///
/// Services hand out both textual and integer identifiers; both are kept
/// as text so that `42` and `"42"` name the same record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for RemoteId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for RemoteId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an execution context, carried on log events
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    /// Generate a new random ContextId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_generation() {
        let id1 = ObjectId::new();
        let id2 = ObjectId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_object_ids_are_time_ordered() {
        let first = ObjectId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ObjectId::new();
        assert!(first < second);
    }

    #[test]
    fn test_object_id_display() {
        let id = ObjectId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_remote_id_from_number_and_text_agree() {
        assert_eq!(RemoteId::from(42_i64), RemoteId::from("42"));
        assert_eq!(RemoteId::from(7_u64).as_str(), "7");
    }

    #[test]
    fn test_remote_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RemoteId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_context_id_generation() {
        assert_ne!(ContextId::new(), ContextId::new());
    }
}
