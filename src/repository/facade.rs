//! The repository facade: every read and write to persistent storage goes
//! through here. Each operation follows the same discipline: validate
//! inputs, consult the cache (reads only), execute via the circuit breaker,
//! maintain the cache, publish events, and emit metrics, in that order.
//!
//! Construction is explicit dependency injection: the facade owns its cache
//! store, breaker registry, and event publisher, and is handed the storage
//! collaborator and configuration. Tests build a fresh repository per test;
//! there is no global state anywhere in this layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::cache::{query_key, record_key, CacheStore};
use crate::config::DataAccessConfig;
use crate::entity::EntityDescriptor;
use crate::error::{DataAccessError, Result};
use crate::events::{ChangeEvent, ChangeOperation, EventPublisher};
use crate::query::{
    entity_join, entity_select, Conditions, FieldRef, JoinConditions, JoinType, QueryOptions,
};
use crate::resilience::{
    BreakerKey, CircuitBreakerError, CircuitBreakerRegistry, CircuitState, OperationClass,
};
use crate::storage::{PgStorage, Record, Storage, StorageResult};
use crate::telemetry;

/// Acknowledgement returned by `delete`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeletedRecord {
    pub entity: String,
    pub id: Value,
}

/// Orchestrates cache, breakers, storage, events, and metrics for all
/// entity reads and writes.
#[derive(Debug)]
pub struct Repository {
    storage: Arc<dyn Storage>,
    cache: Arc<CacheStore>,
    breakers: Arc<CircuitBreakerRegistry>,
    events: EventPublisher,
    config: DataAccessConfig,
}

impl Repository {
    /// Build a repository over any storage collaborator.
    pub fn new(storage: Arc<dyn Storage>, config: DataAccessConfig) -> Self {
        if config.telemetry_enabled {
            telemetry::init_metrics(&config.telemetry);
        }

        let mut registry = CircuitBreakerRegistry::new(config.clone());
        if config.telemetry_enabled {
            registry = registry.with_listener(Arc::new(|entity, class, state| {
                telemetry::data_access::record_breaker_state(entity, class, state);
            }));
        }

        Self {
            storage,
            cache: Arc::new(CacheStore::new(config.cache.max_entries_per_namespace)),
            breakers: Arc::new(registry),
            events: EventPublisher::new(config.events.channel_capacity),
            config,
        }
    }

    /// Build a repository over a PostgreSQL pool.
    pub fn postgres(pool: PgPool, config: DataAccessConfig) -> Self {
        Self::new(Arc::new(PgStorage::new(pool)), config)
    }

    /// Subscribe to domain-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    pub(crate) fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Insert a record. Validation failures surface before any storage or
    /// breaker involvement; successful inserts populate the record cache,
    /// clear the entity's query cache, and publish `record_inserted`.
    pub async fn insert(&self, entity: &EntityDescriptor, attrs: Record) -> Result<Record> {
        self.measure(&entity.name, "insert", || self.insert_inner(entity, attrs))
            .await
    }

    async fn insert_inner(&self, entity: &EntityDescriptor, attrs: Record) -> Result<Record> {
        let violations = entity.validate_insert(&attrs);
        if !violations.is_empty() {
            return Err(DataAccessError::validation(&entity.name, violations));
        }

        let record = self
            .through_breaker(&entity.name, OperationClass::Write, "insert", || async {
                self.storage.insert(entity, &attrs).await
            })
            .await?;

        let id = record.get(&entity.primary_key).cloned();
        self.after_write(entity, id.as_ref(), Some(&record), ChangeOperation::Inserted);
        Ok(record)
    }

    /// Fetch one record by primary key, cache-aside: the record cache is
    /// consulted first, storage on miss, and the cache backfilled on hit.
    pub async fn get(&self, entity: &EntityDescriptor, id: &Value) -> Result<Record> {
        self.measure(&entity.name, "get", || self.get_inner(entity, id))
            .await
    }

    async fn get_inner(&self, entity: &EntityDescriptor, id: &Value) -> Result<Record> {
        let namespace = entity.record_namespace();
        let key = record_key(id);

        if self.config.cache_enabled {
            self.ensure_cache_namespaces(entity);
            if let Some(cached) = self.cache.get(&namespace, &key) {
                self.note_cache_hit(&entity.name, "records");
                if let Some(record) = record_from_value(cached) {
                    return Ok(record);
                }
            } else {
                self.note_cache_miss(&entity.name, "records");
            }
        }

        let fallback = self.cached_record_fallback(&namespace, &key);
        let fetched = self
            .through_breaker_with_fallback(
                &entity.name,
                OperationClass::Read,
                "get",
                || async { self.storage.fetch_by_id(entity, id).await },
                fallback,
            )
            .await?;

        match fetched {
            Some(record) => {
                if self.config.cache_enabled {
                    self.cache.put(
                        &namespace,
                        &key,
                        Value::Object(record.clone()),
                        self.config.record_ttl_for(&entity.name),
                    );
                }
                Ok(record)
            }
            None => Err(DataAccessError::not_found(&entity.name)),
        }
    }

    /// Update a record by primary key. The record cache is backfilled with
    /// the new value and the entity's query cache cleared.
    pub async fn update(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        attrs: Record,
    ) -> Result<Record> {
        self.measure(&entity.name, "update", || self.update_inner(entity, id, attrs))
            .await
    }

    async fn update_inner(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        attrs: Record,
    ) -> Result<Record> {
        let violations = entity.validate_update(&attrs);
        if !violations.is_empty() {
            return Err(DataAccessError::validation(&entity.name, violations));
        }

        let updated = self
            .through_breaker(&entity.name, OperationClass::Write, "update", || async {
                self.storage.update(entity, id, &attrs).await
            })
            .await?;

        match updated {
            Some(record) => {
                self.after_write(entity, Some(id), Some(&record), ChangeOperation::Updated);
                Ok(record)
            }
            None => Err(DataAccessError::not_found(&entity.name)),
        }
    }

    /// Delete a record by primary key. The record cache entry is
    /// invalidated and the entity's query cache cleared.
    pub async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> Result<DeletedRecord> {
        self.measure(&entity.name, "delete", || self.delete_inner(entity, id))
            .await
    }

    async fn delete_inner(&self, entity: &EntityDescriptor, id: &Value) -> Result<DeletedRecord> {
        let deleted = self
            .through_breaker(&entity.name, OperationClass::Write, "delete", || async {
                self.storage.delete(entity, id).await
            })
            .await?;

        if !deleted {
            return Err(DataAccessError::not_found(&entity.name));
        }

        self.after_write(entity, Some(id), None, ChangeOperation::Deleted);
        Ok(DeletedRecord {
            entity: entity.name.clone(),
            id: id.clone(),
        })
    }

    /// List records with options only (no conditions).
    pub async fn list(&self, entity: &EntityDescriptor, options: QueryOptions) -> Result<Vec<Record>> {
        self.measure(&entity.name, "list", || {
            self.find_inner(entity, Conditions::new(), options, "list")
        })
        .await
    }

    /// Find records matching a declarative condition map. Results are
    /// cached per `(conditions, options)` digest with the shorter TTL.
    pub async fn find(
        &self,
        entity: &EntityDescriptor,
        conditions: Conditions,
        options: QueryOptions,
    ) -> Result<Vec<Record>> {
        self.measure(&entity.name, "find", || {
            self.find_inner(entity, conditions, options, "find")
        })
        .await
    }

    async fn find_inner(
        &self,
        entity: &EntityDescriptor,
        conditions: Conditions,
        options: QueryOptions,
        operation: &'static str,
    ) -> Result<Vec<Record>> {
        let namespace = entity.query_namespace();
        let key = query_key(&conditions, &options);

        if self.config.cache_enabled {
            self.ensure_cache_namespaces(entity);
            if let Some(cached) = self.cache.get(&namespace, &key) {
                self.note_cache_hit(&entity.name, "queries");
                if let Some(rows) = rows_from_value(cached) {
                    return Ok(rows);
                }
            } else {
                self.note_cache_miss(&entity.name, "queries");
            }
        }

        let query = entity_select(entity, &conditions, &options);
        let fallback = self.cached_rows_fallback(&namespace, &key);
        let rows = self
            .through_breaker_with_fallback(
                &entity.name,
                OperationClass::Read,
                operation,
                || async { self.storage.select(entity, &query).await },
                fallback,
            )
            .await?;

        let rows = if options.preload.is_empty() {
            rows
        } else {
            self.apply_preloads(entity, rows, &options.preload).await?
        };

        if self.config.telemetry_enabled {
            telemetry::data_access::record_result_count(&entity.name, operation, rows.len());
        }

        if self.config.cache_enabled {
            let cached_rows = rows.iter().cloned().map(Value::Object).collect();
            self.cache.put(
                &namespace,
                &key,
                Value::Array(cached_rows),
                self.config.query_ttl_for(&entity.name),
            );
        }

        Ok(rows)
    }

    /// Inner join between two entities, conventional foreign-key naming
    /// inferred unless `options.join_on` is given.
    pub async fn join_inner(
        &self,
        left: &EntityDescriptor,
        right: &EntityDescriptor,
        select: &[FieldRef],
        conditions: &JoinConditions,
        options: QueryOptions,
    ) -> Result<Vec<Record>> {
        self.join_op(JoinType::Inner, "join_inner", left, right, select, conditions, options)
            .await
    }

    /// Left join: all left rows retained.
    pub async fn join_left(
        &self,
        left: &EntityDescriptor,
        right: &EntityDescriptor,
        select: &[FieldRef],
        conditions: &JoinConditions,
        options: QueryOptions,
    ) -> Result<Vec<Record>> {
        self.join_op(JoinType::Left, "join_left", left, right, select, conditions, options)
            .await
    }

    /// Right join: all right rows retained, left-side fields null for
    /// unmatched rows.
    pub async fn join_right(
        &self,
        left: &EntityDescriptor,
        right: &EntityDescriptor,
        select: &[FieldRef],
        conditions: &JoinConditions,
        options: QueryOptions,
    ) -> Result<Vec<Record>> {
        self.join_op(JoinType::Right, "join_right", left, right, select, conditions, options)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn join_op(
        &self,
        join_type: JoinType,
        operation: &'static str,
        left: &EntityDescriptor,
        right: &EntityDescriptor,
        select: &[FieldRef],
        conditions: &JoinConditions,
        options: QueryOptions,
    ) -> Result<Vec<Record>> {
        self.measure(&left.name, operation, || {
            self.join_op_inner(join_type, operation, left, right, select, conditions, options)
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn join_op_inner(
        &self,
        join_type: JoinType,
        operation: &'static str,
        left: &EntityDescriptor,
        right: &EntityDescriptor,
        select: &[FieldRef],
        conditions: &JoinConditions,
        options: QueryOptions,
    ) -> Result<Vec<Record>> {
        let query = entity_join(join_type, left, right, select, conditions, &options)?;

        // Joins run under the left entity's read breaker and bypass the
        // cache: only the record/query namespaces exist.
        let rows = self
            .through_breaker(&left.name, OperationClass::Read, operation, || async {
                self.storage.select(left, &query).await
            })
            .await?;

        if self.config.telemetry_enabled {
            telemetry::data_access::record_result_count(&left.name, operation, rows.len());
        }

        Ok(rows)
    }

    // Administrative surface

    /// Force a breaker back to closed with zeroed counters.
    pub fn reset_breaker(&self, entity: &str, class: OperationClass) -> bool {
        self.breakers.reset(entity, class)
    }

    /// Snapshot of every breaker's state.
    pub fn breaker_states(&self) -> Vec<(BreakerKey, CircuitState)> {
        self.breakers.states()
    }

    /// State of one breaker, if it has been created.
    pub fn breaker_state(&self, entity: &str, class: OperationClass) -> Option<CircuitState> {
        self.breakers
            .states()
            .into_iter()
            .find(|(key, _)| key.entity == entity && key.class == class)
            .map(|(_, state)| state)
    }

    /// Drop both cache namespaces for an entity.
    pub fn invalidate_entity(&self, entity: &EntityDescriptor) {
        self.cache.clear_namespace(&entity.record_namespace());
        self.cache.clear_namespace(&entity.query_namespace());
    }

    /// Live cache entry counts for an entity: `(records, queries)`.
    pub fn cache_size(&self, entity: &EntityDescriptor) -> (usize, usize) {
        (
            self.cache.size(&entity.record_namespace()),
            self.cache.size(&entity.query_namespace()),
        )
    }

    /// Probe the storage collaborator directly, bypassing breakers.
    pub async fn health_check(&self) -> Result<()> {
        self.storage.health_check().await?;
        Ok(())
    }

    // Orchestration helpers

    pub(crate) async fn through_breaker<T, F, Fut>(
        &self,
        entity: &str,
        class: OperationClass,
        operation: &'static str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        self.through_breaker_with_fallback(entity, class, operation, f, None::<fn() -> Option<T>>)
            .await
    }

    async fn through_breaker_with_fallback<T, F, Fut, FB>(
        &self,
        entity: &str,
        class: OperationClass,
        operation: &'static str,
        f: F,
        fallback: Option<FB>,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
        FB: FnOnce() -> Option<T>,
    {
        if !self.config.circuit_breaker_enabled {
            return Ok(f().await?);
        }

        let breaker = self.breakers.breaker(entity, class);
        match breaker.call_with_fallback(f, fallback).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::CircuitOpen { .. }) => {
                Err(DataAccessError::unavailable(entity, operation))
            }
            Err(CircuitBreakerError::OperationFailed(err)) => Err(DataAccessError::Storage(err)),
        }
    }

    /// Fallback closure serving a cached record when the circuit is open.
    fn cached_record_fallback<'a>(
        &'a self,
        namespace: &'a str,
        key: &'a str,
    ) -> Option<impl FnOnce() -> Option<Option<Record>> + 'a> {
        if !self.config.cache_enabled {
            return None;
        }
        Some(move || {
            self.cache
                .get(namespace, key)
                .and_then(record_from_value)
                .map(Some)
        })
    }

    /// Fallback closure serving cached rows when the circuit is open.
    fn cached_rows_fallback<'a>(
        &'a self,
        namespace: &'a str,
        key: &'a str,
    ) -> Option<impl FnOnce() -> Option<Vec<Record>> + 'a> {
        if !self.config.cache_enabled {
            return None;
        }
        Some(move || self.cache.get(namespace, key).and_then(rows_from_value))
    }

    /// Post-write cache maintenance and event publication, shared by
    /// insert/update/delete. The record entry is replaced or invalidated,
    /// and the entity's whole query namespace is cleared: the predicate
    /// space is unbounded, so query results are never selectively
    /// invalidated.
    fn after_write(
        &self,
        entity: &EntityDescriptor,
        id: Option<&Value>,
        record: Option<&Record>,
        operation: ChangeOperation,
    ) {
        if self.config.cache_enabled {
            self.ensure_cache_namespaces(entity);
            if let Some(id) = id {
                let key = record_key(id);
                match record {
                    Some(record) => self.cache.put(
                        &entity.record_namespace(),
                        &key,
                        Value::Object(record.clone()),
                        self.config.record_ttl_for(&entity.name),
                    ),
                    None => self.cache.invalidate(&entity.record_namespace(), &key),
                }
            }
            self.cache.clear_namespace(&entity.query_namespace());
        }

        if self.config.events_enabled {
            let event = ChangeEvent::new(&entity.name, id.cloned(), operation);
            if self.events.publish(event).is_ok() && self.config.telemetry_enabled {
                telemetry::data_access::record_event_published(
                    &entity.name,
                    operation.event_name(),
                );
            }
        }
    }

    fn ensure_cache_namespaces(&self, entity: &EntityDescriptor) {
        let capacity = self.config.max_entries_for(&entity.name);
        self.cache
            .configure_namespace(&entity.record_namespace(), capacity);
        self.cache
            .configure_namespace(&entity.query_namespace(), capacity);
    }

    fn note_cache_hit(&self, entity: &str, namespace_kind: &'static str) {
        debug!(entity = entity, namespace = namespace_kind, "cache hit");
        if self.config.telemetry_enabled {
            telemetry::data_access::record_cache_hit(entity, namespace_kind);
        }
    }

    fn note_cache_miss(&self, entity: &str, namespace_kind: &'static str) {
        debug!(entity = entity, namespace = namespace_kind, "cache miss");
        if self.config.telemetry_enabled {
            telemetry::data_access::record_cache_miss(entity, namespace_kind);
        }
    }

    /// The telemetry span: runs an operation future and applies the
    /// metrics/logging side effects uniformly regardless of outcome. Every
    /// public operation goes through here exactly once.
    async fn measure<T, F, Fut>(&self, entity: &str, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.config.telemetry_enabled {
            telemetry::data_access::record_started(entity, operation);
        }
        let started = Instant::now();
        let result = f().await;
        self.finish(entity, operation, started, result)
    }

    /// Uniform outcome handling: duration histogram, outcome counter, and
    /// a log line at the level the outcome deserves.
    fn finish<T>(
        &self,
        entity: &str,
        operation: &'static str,
        started: Instant,
        result: Result<T>,
    ) -> Result<T> {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.outcome(),
        };

        if self.config.telemetry_enabled {
            telemetry::data_access::record_outcome(entity, operation, outcome, duration_ms);
        }

        match &result {
            Ok(_) => {
                debug!(
                    entity = entity,
                    operation = operation,
                    duration_ms = duration_ms,
                    "operation completed"
                );
            }
            Err(DataAccessError::Storage(err)) => {
                error!(
                    entity = entity,
                    operation = operation,
                    duration_ms = duration_ms,
                    error = %err,
                    "storage fault"
                );
            }
            Err(DataAccessError::ServiceUnavailable { .. }) => {
                warn!(
                    entity = entity,
                    operation = operation,
                    duration_ms = duration_ms,
                    "short-circuited: service unavailable"
                );
            }
            Err(err) => {
                debug!(
                    entity = entity,
                    operation = operation,
                    duration_ms = duration_ms,
                    outcome = err.outcome(),
                    "operation rejected"
                );
            }
        }

        result
    }
}

/// Interpret a cached value as a record.
fn record_from_value(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Interpret a cached value as a result-set.
fn rows_from_value(value: Value) -> Option<Vec<Record>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
