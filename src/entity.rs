//! # Entity Descriptors
//!
//! Schema/shape metadata for storage-backed types, supplied by the caller on
//! every repository call. A descriptor is an explicit capability record: the
//! field list drives attribute validation, the primary key drives record
//! cache keys and default ordering, and associations drive eager loading.
//! This layer never introspects storage for schema information.

use serde_json::Value;

use crate::error::FieldViolation;
use crate::storage::Record;

/// Scalar/shape classification used for attribute validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Uuid,
    Timestamp,
    Json,
}

impl FieldKind {
    fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Uuid => "uuid",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Json => "json",
        }
    }

    /// Check a JSON attribute value against this kind. Null is always
    /// accepted here; required-presence is a separate check.
    fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Float => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Uuid => value
                .as_str()
                .map(|s| uuid::Uuid::parse_str(s).is_ok())
                .unwrap_or(false),
            FieldKind::Timestamp => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            FieldKind::Json => value.is_object() || value.is_array(),
        }
    }
}

/// A single field on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub max_length: Option<usize>,
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            max_length: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// A has-many association used by eager loading: rows of `table` whose
/// `foreign_key` column points back at the parent's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    pub table: String,
    pub foreign_key: String,
}

impl Association {
    pub fn has_many(
        name: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Immutable descriptor for a storage-backed entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: String,
    pub primary_key: String,
    pub fields: Vec<FieldDescriptor>,
    pub associations: Vec<Association>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Declared field names, primary key included.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field_descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn association_named(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Cache namespace holding individual records for this entity.
    pub fn record_namespace(&self) -> String {
        format!("{}:records", self.name)
    }

    /// Cache namespace holding query-result sets for this entity.
    pub fn query_namespace(&self) -> String {
        format!("{}:queries", self.name)
    }

    /// Validate attributes for an insert: unknown fields are rejected, all
    /// required non-primary-key fields must be present and non-null, and
    /// every supplied value must match its declared kind.
    pub fn validate_insert(&self, attrs: &Record) -> Vec<FieldViolation> {
        let mut violations = self.validate_shapes(attrs);

        for field in &self.fields {
            if !field.required || field.name == self.primary_key {
                continue;
            }
            let missing = match attrs.get(&field.name) {
                None => true,
                Some(value) => value.is_null(),
            };
            if missing {
                violations.push(FieldViolation::new(&field.name, "is required"));
            }
        }

        violations
    }

    /// Validate attributes for an update: same shape checks as insert, but
    /// absent fields are untouched rather than missing.
    pub fn validate_update(&self, attrs: &Record) -> Vec<FieldViolation> {
        self.validate_shapes(attrs)
    }

    fn validate_shapes(&self, attrs: &Record) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        for (name, value) in attrs {
            let Some(field) = self.field_descriptor(name) else {
                violations.push(FieldViolation::new(name, "is not a known field"));
                continue;
            };

            if !field.kind.accepts(value) {
                violations.push(FieldViolation::new(
                    name,
                    format!("expected {}", field.kind.describe()),
                ));
                continue;
            }

            if let (Some(max), Some(text)) = (field.max_length, value.as_str()) {
                if text.chars().count() > max {
                    violations.push(FieldViolation::new(
                        name,
                        format!("exceeds maximum length of {max}"),
                    ));
                }
            }
        }

        violations
    }
}

/// Convert an identifier to snake_case. Used by join-field inference to
/// derive the conventional foreign-key column name.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_lower = false;
        } else if ch == '-' || ch == ' ' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget() -> EntityDescriptor {
        EntityDescriptor::new("widget", "id")
            .field(FieldDescriptor::optional("id", FieldKind::Integer))
            .field(FieldDescriptor::required("name", FieldKind::Text).with_max_length(16))
            .field(FieldDescriptor::optional("count", FieldKind::Integer))
            .field(FieldDescriptor::optional("tags", FieldKind::Json))
    }

    fn attrs(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_insert_passes() {
        let violations = widget().validate_insert(&attrs(json!({"name": "gear", "count": 3})));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let violations = widget().validate_insert(&attrs(json!({"count": 3})));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "name");
        assert_eq!(violations[0].message, "is required");
    }

    #[test]
    fn test_null_required_field_is_missing() {
        let violations = widget().validate_insert(&attrs(json!({"name": null})));
        assert!(violations.iter().any(|v| v.field == "name"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let violations =
            widget().validate_insert(&attrs(json!({"name": "gear", "colour": "red"})));
        assert!(violations
            .iter()
            .any(|v| v.field == "colour" && v.message.contains("not a known field")));
    }

    #[test]
    fn test_kind_mismatch() {
        let violations = widget().validate_insert(&attrs(json!({"name": "gear", "count": "3"})));
        assert!(violations
            .iter()
            .any(|v| v.field == "count" && v.message.contains("integer")));
    }

    #[test]
    fn test_max_length_enforced() {
        let violations =
            widget().validate_insert(&attrs(json!({"name": "a-very-long-widget-name"})));
        assert!(violations
            .iter()
            .any(|v| v.field == "name" && v.message.contains("maximum length")));
    }

    #[test]
    fn test_update_does_not_require_presence() {
        let violations = widget().validate_update(&attrs(json!({"count": 7})));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_namespaces() {
        let entity = widget();
        assert_eq!(entity.record_namespace(), "widget:records");
        assert_eq!(entity.query_namespace(), "widget:queries");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("widget"), "widget");
        assert_eq!(snake_case("WorkOrder"), "work_order");
        assert_eq!(snake_case("userProfile"), "user_profile");
        assert_eq!(snake_case("HTTPServer"), "httpserver");
    }
}
