#![allow(dead_code)] // each integration test binary uses a subset of these fixtures

//! Shared fixtures for integration tests: an in-memory scripted storage
//! collaborator with failure injection, call counting, and SQL capture,
//! plus entity descriptors used across the suite.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use datahub_core::cache::record_key;
use datahub_core::config::{BreakerSettings, DataAccessConfig};
use datahub_core::entity::{Association, EntityDescriptor, FieldDescriptor, FieldKind};
use datahub_core::query::SelectQuery;
use datahub_core::storage::{Record, Storage, StorageError, StorageResult};

/// In-memory storage fake. Rows live in per-entity tables keyed by the
/// stringified primary key; every call is logged, select SQL is captured,
/// and a single injected error can make every operation fail.
#[derive(Debug, Default)]
pub struct MockStorage {
    tables: Mutex<HashMap<String, BTreeMap<String, Record>>>,
    next_id: AtomicI64,
    fail_with: Mutex<Option<StorageError>>,
    scripted_selects: Mutex<VecDeque<Vec<Record>>>,
    calls: Mutex<Vec<String>>,
    captured_sql: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Make every subsequent operation fail with the given error.
    pub fn fail_all(&self, error: StorageError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    /// Clear the injected failure.
    pub fn heal(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    /// Queue an explicit result for the next `select` call. When the queue
    /// is empty, `select` returns every row of the entity's table.
    pub fn push_select(&self, rows: Vec<Record>) {
        self.scripted_selects.lock().unwrap().push_back(rows);
    }

    /// Number of calls whose log entry starts with `prefix`
    /// (e.g. `"insert:widget"` or just `"select"`).
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Captured SQL of every `select`, oldest first.
    pub fn sql_log(&self) -> Vec<String> {
        self.captured_sql.lock().unwrap().clone()
    }

    /// Seed a row directly, bypassing call accounting.
    pub fn seed(&self, entity: &str, record: Record) {
        let key = record_key(&record["id"]);
        self.tables
            .lock()
            .unwrap()
            .entry(entity.to_string())
            .or_default()
            .insert(key, record);
    }

    fn note(&self, method: &str, entity: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{method}:{entity}"));
    }

    fn check_failure(&self) -> StorageResult<()> {
        match self.fail_with.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn insert(&self, entity: &EntityDescriptor, attrs: &Record) -> StorageResult<Record> {
        self.note("insert", &entity.name);
        self.check_failure()?;

        let mut record = attrs.clone();
        if !record.contains_key(&entity.primary_key) {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            record.insert(entity.primary_key.clone(), json!(id));
        }

        let key = record_key(&record[&entity.primary_key]);
        self.tables
            .lock()
            .unwrap()
            .entry(entity.name.clone())
            .or_default()
            .insert(key, record.clone());
        Ok(record)
    }

    async fn fetch_by_id(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
    ) -> StorageResult<Option<Record>> {
        self.note("fetch", &entity.name);
        self.check_failure()?;

        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&entity.name)
            .and_then(|table| table.get(&record_key(id)))
            .cloned())
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        attrs: &Record,
    ) -> StorageResult<Option<Record>> {
        self.note("update", &entity.name);
        self.check_failure()?;

        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables
            .get_mut(&entity.name)
            .and_then(|table| table.get_mut(&record_key(id)))
        else {
            return Ok(None);
        };

        for (field, value) in attrs {
            row.insert(field.clone(), value.clone());
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> StorageResult<bool> {
        self.note("delete", &entity.name);
        self.check_failure()?;

        Ok(self
            .tables
            .lock()
            .unwrap()
            .get_mut(&entity.name)
            .and_then(|table| table.remove(&record_key(id)))
            .is_some())
    }

    async fn select(
        &self,
        entity: &EntityDescriptor,
        query: &SelectQuery,
    ) -> StorageResult<Vec<Record>> {
        self.note("select", &entity.name);
        self.captured_sql.lock().unwrap().push(query.sql.clone());
        self.check_failure()?;

        if let Some(rows) = self.scripted_selects.lock().unwrap().pop_front() {
            return Ok(rows);
        }

        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&entity.name)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.check_failure()
    }
}

/// The entity most tests operate on.
pub fn widget() -> EntityDescriptor {
    EntityDescriptor::new("widget", "id")
        .field(FieldDescriptor::optional("id", FieldKind::Integer))
        .field(FieldDescriptor::required("name", FieldKind::Text))
        .field(FieldDescriptor::optional("count", FieldKind::Integer))
        .association(Association::has_many("tags", "widget_tags", "widget_id"))
}

/// Right-hand entity for join tests.
pub fn order() -> EntityDescriptor {
    EntityDescriptor::new("order", "id")
        .field(FieldDescriptor::optional("id", FieldKind::Integer))
        .field(FieldDescriptor::optional("widget_id", FieldKind::Integer))
        .field(FieldDescriptor::optional("name", FieldKind::Text))
}

/// Test configuration: telemetry off, fast breaker thresholds.
pub fn test_config() -> DataAccessConfig {
    DataAccessConfig {
        telemetry_enabled: false,
        circuit_breaker: BreakerSettings {
            failure_threshold: 2,
            reset_timeout_ms: 10_000,
            half_open_threshold: 1,
        },
        ..DataAccessConfig::default()
    }
}

pub fn attrs(value: Value) -> Record {
    value.as_object().cloned().expect("attrs must be an object")
}

pub fn communication_error() -> StorageError {
    StorageError::Communication("connection refused".to_string())
}
