//! WHERE clause construction from declarative condition maps.
//!
//! Callers describe predicates as a map from field name to
//! [`ConditionValue`]; translation into SQL follows a fixed operator table:
//!
//! | condition value        | SQL                                   |
//! |------------------------|---------------------------------------|
//! | `Null` / `Eq(null)`    | `field IS NULL`                       |
//! | `NotNull`              | `field IS NOT NULL`                   |
//! | `Eq(literal)`          | `field = literal`                     |
//! | `In([..])`             | `field IN (..)`; empty list is `1=0`  |
//! | `NotIn([..])`          | `field NOT IN (..)`; empty is a no-op |
//! | `In`/`NotIn` non-list  | no-op (condition dropped)             |
//! | `Like(term)`           | `field LIKE '%term%'`                 |
//! | `ILike(term)`          | `field ILIKE '%term%'`                |
//!
//! Malformed `in`/`not_in` inputs are dropped rather than turned into an
//! always-false predicate, and equality against JSON null is normalized to
//! `IS NULL` because `= NULL` never matches in SQL.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Declarative predicate applied to a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum ConditionValue {
    Null,
    NotNull,
    Eq(Value),
    In(Value),
    NotIn(Value),
    Like(String),
    ILike(String),
}

impl ConditionValue {
    /// Translate into a renderable condition for `field`. `None` means the
    /// condition is a no-op and must be omitted from the WHERE clause.
    pub fn to_condition(&self, field: &str) -> Option<Condition> {
        match self {
            ConditionValue::Null => Some(Condition::IsNull {
                field: field.to_string(),
            }),
            ConditionValue::NotNull => Some(Condition::IsNotNull {
                field: field.to_string(),
            }),
            ConditionValue::Eq(Value::Null) => Some(Condition::IsNull {
                field: field.to_string(),
            }),
            ConditionValue::Eq(value) => Some(Condition::Simple {
                field: field.to_string(),
                operator: "=".to_string(),
                value: value.clone(),
            }),
            ConditionValue::In(Value::Array(values)) => {
                if values.is_empty() {
                    // `IN ()` is invalid SQL; an empty membership list matches nothing
                    Some(Condition::Raw {
                        sql: "1=0".to_string(),
                    })
                } else {
                    Some(Condition::In {
                        field: field.to_string(),
                        values: values.clone(),
                    })
                }
            }
            ConditionValue::NotIn(Value::Array(values)) => {
                if values.is_empty() {
                    None
                } else {
                    Some(Condition::NotIn {
                        field: field.to_string(),
                        values: values.clone(),
                    })
                }
            }
            // Malformed membership input: drop the condition instead of
            // constructing an always-false predicate.
            ConditionValue::In(_) | ConditionValue::NotIn(_) => None,
            ConditionValue::Like(term) => Some(Condition::Like {
                field: field.to_string(),
                term: term.clone(),
                case_insensitive: false,
            }),
            ConditionValue::ILike(term) => Some(Condition::Like {
                field: field.to_string(),
                term: term.clone(),
                case_insensitive: true,
            }),
        }
    }
}

/// An ordered condition map. `BTreeMap` ordering doubles as the canonical
/// ordering for query-cache key derivation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conditions(BTreeMap<String, ConditionValue>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), ConditionValue::Eq(value.into()));
        self
    }

    pub fn is_null(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), ConditionValue::Null);
        self
    }

    pub fn not_null(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), ConditionValue::NotNull);
        self
    }

    /// Membership against a well-formed list.
    pub fn in_list(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0
            .insert(field.into(), ConditionValue::In(Value::Array(values)));
        self
    }

    pub fn not_in_list(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0
            .insert(field.into(), ConditionValue::NotIn(Value::Array(values)));
        self
    }

    /// Membership against an arbitrary JSON value; anything that is not an
    /// array is treated as a no-op filter at translation time.
    pub fn in_raw(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), ConditionValue::In(value));
        self
    }

    pub fn not_in_raw(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), ConditionValue::NotIn(value));
        self
    }

    pub fn like(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.0.insert(field.into(), ConditionValue::Like(term.into()));
        self
    }

    pub fn ilike(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.0
            .insert(field.into(), ConditionValue::ILike(term.into()));
        self
    }

    pub fn condition(mut self, field: impl Into<String>, value: ConditionValue) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConditionValue)> {
        self.0.iter()
    }

    /// Translate every entry, dropping no-ops, in canonical field order.
    pub fn to_conditions(&self) -> Vec<Condition> {
        self.0
            .iter()
            .filter_map(|(field, value)| value.to_condition(field))
            .collect()
    }
}

/// Renderable SQL condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Simple {
        field: String,
        operator: String,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    NotIn {
        field: String,
        values: Vec<Value>,
    },
    IsNull {
        field: String,
    },
    IsNotNull {
        field: String,
    },
    Like {
        field: String,
        term: String,
        case_insensitive: bool,
    },
    Raw {
        sql: String,
    },
}

impl Condition {
    /// Convert condition to SQL string
    pub fn to_sql(&self) -> String {
        match self {
            Condition::Simple {
                field,
                operator,
                value,
            } => {
                format!("{} {} {}", field, operator, format_value(value))
            }
            Condition::In { field, values } => {
                let value_list = values
                    .iter()
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{field} IN ({value_list})")
            }
            Condition::NotIn { field, values } => {
                let value_list = values
                    .iter()
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{field} NOT IN ({value_list})")
            }
            Condition::IsNull { field } => {
                format!("{field} IS NULL")
            }
            Condition::IsNotNull { field } => {
                format!("{field} IS NOT NULL")
            }
            Condition::Like {
                field,
                term,
                case_insensitive,
            } => {
                let operator = if *case_insensitive { "ILIKE" } else { "LIKE" };
                format!("{} {} '%{}%'", field, operator, escape_like_term(term))
            }
            Condition::Raw { sql } => sql.clone(),
        }
    }
}

/// Format a JSON value as a SQL literal.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        _ => format!("'{}'", value.to_string().replace('\'', "''")),
    }
}

/// Escape quote characters and LIKE wildcards so the term matches as a
/// literal substring.
fn escape_like_term(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('\'', "''")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
