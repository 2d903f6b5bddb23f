//! # Storage Collaborator Boundary
//!
//! The underlying storage engine is external to this layer. It is specified
//! here only at its interface: a conventional CRUD/query API over named
//! entities, operating on dynamic JSON records. The repository facade talks
//! to a [`Storage`] trait object so production code can use PostgreSQL while
//! tests script outcomes hermetically.

pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::EntityDescriptor;
use crate::query::SelectQuery;

pub use postgres::PgStorage;

/// A dynamic record: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Failures reported by the storage collaborator. Every variant counts as a
/// breaker failure; absence of a record does not (it is reported through
/// `Option`/`bool` returns, not through this enum).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The named entity has no backing relation. Fatal misconfiguration.
    #[error("entity {entity} has no backing relation: {message}")]
    TableNotFound { entity: String, message: String },

    /// The relation exists but disagrees with the descriptor (unknown
    /// column, bad reference).
    #[error("schema mismatch for {entity}: {message}")]
    Schema { entity: String, message: String },

    /// Connection-level failure: pool exhaustion, broken socket, timeout.
    #[error("storage communication failure: {0}")]
    Communication(String),

    /// Any other backend failure.
    #[error("storage query failed: {0}")]
    Query(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Conventional CRUD/query surface expected from the storage engine.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Insert a record and return it as stored (generated columns included).
    async fn insert(&self, entity: &EntityDescriptor, attrs: &Record) -> StorageResult<Record>;

    /// Fetch one record by primary key. `None` when absent.
    async fn fetch_by_id(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
    ) -> StorageResult<Option<Record>>;

    /// Update a record by primary key, returning the new value, or `None`
    /// when no such record exists.
    async fn update(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        attrs: &Record,
    ) -> StorageResult<Option<Record>>;

    /// Delete a record by primary key. `false` when no such record exists.
    async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> StorageResult<bool>;

    /// Execute a built select and return its rows.
    async fn select(
        &self,
        entity: &EntityDescriptor,
        query: &SelectQuery,
    ) -> StorageResult<Vec<Record>>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> StorageResult<()>;
}
