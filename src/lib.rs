#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # DataHub Core
//!
//! Resilient cached data-access layer: mediates all reads and writes to
//! persistent storage on behalf of application entities, adding fault
//! isolation (circuit breaking), read acceleration (cache-aside), and
//! observability (metrics/events) around a dynamic query-construction
//! engine.
//!
//! ## Architecture
//!
//! - [`repository`] - the facade orchestrating every operation
//! - [`cache`] - TTL cache store with per-entity record/query namespaces
//! - [`resilience`] - circuit breakers per (entity, operation class)
//! - [`query`] - declarative condition translation, joins, pagination
//! - [`storage`] - the storage collaborator boundary (PostgreSQL via SQLx)
//! - [`events`] - domain-change event publishing
//! - [`telemetry`] - OpenTelemetry metrics
//! - [`entity`] - caller-supplied entity descriptors and validation
//! - [`config`] - toggles, TTLs, thresholds, per-entity overrides
//! - [`error`] - operation outcome taxonomy
//!
//! Control flow for every call: validate -> consult cache (reads) ->
//! execute via breaker -> update/invalidate cache -> publish events ->
//! emit metrics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datahub_core::config::DataAccessConfig;
//! use datahub_core::entity::{EntityDescriptor, FieldDescriptor, FieldKind};
//! use datahub_core::repository::Repository;
//! use serde_json::json;
//!
//! # async fn example(pool: sqlx::PgPool) -> datahub_core::Result<()> {
//! let repository = Repository::postgres(pool, DataAccessConfig::from_env());
//!
//! let widget = EntityDescriptor::new("widget", "id")
//!     .field(FieldDescriptor::optional("id", FieldKind::Integer))
//!     .field(FieldDescriptor::required("name", FieldKind::Text));
//!
//! let attrs = json!({"name": "gear"}).as_object().cloned().unwrap();
//! let record = repository.insert(&widget, attrs).await?;
//! let fetched = repository.get(&widget, &record["id"]).await?;
//! assert_eq!(record, fetched);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod logging;
pub mod query;
pub mod repository;
pub mod resilience;
pub mod storage;
pub mod telemetry;

pub use config::DataAccessConfig;
pub use entity::{Association, EntityDescriptor, FieldDescriptor, FieldKind};
pub use error::{DataAccessError, FieldViolation, Result};
pub use events::{ChangeEvent, ChangeOperation};
pub use query::{Conditions, FieldRef, QueryOptions, SortDirection};
pub use repository::{DeletedRecord, Repository};
pub use resilience::{CircuitState, OperationClass};
pub use storage::{Record, Storage, StorageError};
