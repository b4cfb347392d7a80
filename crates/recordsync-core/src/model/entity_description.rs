use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dates::parse_date;

/// Storage type of an attribute, checked against the serialized value at save time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    /// ISO-8601 text or epoch seconds
    Date,
    Array,
    /// Any JSON value
    Json,
}

impl AttributeType {
    /// Whether a non-null JSON value is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Integer => value.is_i64() || value.is_u64(),
            AttributeType::Float => value.is_number(),
            AttributeType::Boolean => value.is_boolean(),
            AttributeType::Date => parse_date(value).is_some(),
            AttributeType::Array => value.is_array(),
            AttributeType::Json => true,
        }
    }
}

/// One declared attribute of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub optional: bool,
}

impl AttributeDescription {
    /// A required attribute: must be present and non-null to save
    pub fn required(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: false,
        }
    }

    /// An optional attribute: may be absent or null
    pub fn optional(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: true,
        }
    }
}

/// Schema description of one entity
///
/// Entities are stored as JSON attribute maps; the description is what
/// `save` validates those maps against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    pub attributes: Vec<AttributeDescription>,
}

impl EntityDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<AttributeDescription>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDescription) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a serialized object against this description
    ///
    /// Returns one message per violation, in attribute declaration order
    /// followed by undeclared keys in map order. Empty means valid.
    pub fn validate(&self, attributes: &Map<String, Value>) -> Vec<String> {
        let mut violations = Vec::new();

        for attribute in &self.attributes {
            match attributes.get(&attribute.name) {
                None | Some(Value::Null) => {
                    if !attribute.optional {
                        violations.push(format!("{}: required attribute is missing", attribute.name));
                    }
                }
                Some(value) => {
                    if !attribute.attribute_type.accepts(value) {
                        violations.push(format!(
                            "{}: expected {:?}, found {}",
                            attribute.name,
                            attribute.attribute_type,
                            json_kind(value)
                        ));
                    }
                }
            }
        }

        for key in attributes.keys() {
            if self.attribute(key).is_none() {
                violations.push(format!("{}: attribute is not declared", key));
            }
        }

        violations
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gist() -> EntityDescription {
        EntityDescription::new("Gist")
            .with_attribute(AttributeDescription::required("remote_id", AttributeType::String))
            .with_attribute(AttributeDescription::optional("stars", AttributeType::Integer))
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_object_has_no_violations() {
        let violations = gist().validate(&map(json!({"remote_id": "1", "stars": 3})));
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn test_optional_attribute_may_be_null() {
        assert!(gist()
            .validate(&map(json!({"remote_id": "1", "stars": null})))
            .is_empty());
    }

    #[test]
    fn test_missing_required_attribute_is_reported() {
        let violations = gist().validate(&map(json!({"remote_id": null})));
        assert_eq!(violations, vec!["remote_id: required attribute is missing"]);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let violations = gist().validate(&map(json!({"remote_id": "1", "stars": "many"})));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("stars: expected Integer"));
    }

    #[test]
    fn test_undeclared_attribute_is_reported() {
        let violations = gist().validate(&map(json!({"remote_id": "1", "colour": "red"})));
        assert_eq!(violations, vec!["colour: attribute is not declared"]);
    }

    #[test]
    fn test_date_attribute_accepts_iso_text() {
        assert!(AttributeType::Date.accepts(&json!("2014-01-01T00:00:00Z")));
        assert!(!AttributeType::Date.accepts(&json!("soon")));
    }
}
