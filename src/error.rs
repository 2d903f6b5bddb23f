//! # Structured Error Handling
//!
//! Central error taxonomy for the data-access layer. The variants map
//! one-to-one onto operation outcomes: validation failures and missing
//! records are legitimate results surfaced to the caller, while storage
//! faults and open circuits represent infrastructure conditions.

use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    /// Caller input was rejected before any storage or breaker involvement.
    #[error("validation failed for {entity}: {}", format_violations(.violations))]
    Validation {
        entity: String,
        violations: Vec<FieldViolation>,
    },

    /// The requested record does not exist. A legitimate outcome, not a fault.
    #[error("{entity} not found")]
    NotFound { entity: String },

    /// The circuit for this entity/operation class is open. Never retried by
    /// this layer; retry policy belongs to the caller.
    #[error("service unavailable for {entity} {operation}")]
    ServiceUnavailable { entity: String, operation: String },

    /// Opaque failure from the storage collaborator.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DataAccessError {
    pub fn validation(entity: impl Into<String>, violations: Vec<FieldViolation>) -> Self {
        Self::Validation {
            entity: entity.into(),
            violations,
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn unavailable(entity: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            entity: entity.into(),
            operation: operation.into(),
        }
    }

    /// Outcome tag used as a metrics attribute and in structured logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Storage(_) => "storage_error",
        }
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, DataAccessError>;
