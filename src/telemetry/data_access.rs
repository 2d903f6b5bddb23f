//! Data-access instruments.
//!
//! Counters, histograms, and the breaker-state gauge for every repository
//! operation. Logical counter names like `widget.insert.success` are
//! rendered the OpenTelemetry way: stable instrument names with `entity` /
//! `operation` / `outcome` attributes.

use std::sync::OnceLock;

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;

use crate::resilience::{CircuitState, OperationClass};

/// Lazy-initialized meter for data-access metrics
static DATA_ACCESS_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    DATA_ACCESS_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("datahub-data-access"))
}

// Counters

/// Operations dispatched, before any outcome is known.
///
/// Labels:
/// - entity: descriptor name
/// - operation: insert, get, update, delete, list, find, join_*
pub fn operations_started() -> Counter<u64> {
    meter()
        .u64_counter("datahub.operations.started")
        .with_description("Repository operations dispatched")
        .init()
}

/// Operations that completed successfully.
pub fn operations_succeeded() -> Counter<u64> {
    meter()
        .u64_counter("datahub.operations.succeeded")
        .with_description("Repository operations that completed successfully")
        .init()
}

/// Operations that failed with an infrastructure outcome.
///
/// Labels additionally carry `outcome`: service_unavailable, storage_error.
pub fn operations_failed() -> Counter<u64> {
    meter()
        .u64_counter("datahub.operations.failed")
        .with_description("Repository operations that failed")
        .init()
}

/// Caller input rejected before storage involvement.
pub fn validation_failures() -> Counter<u64> {
    meter()
        .u64_counter("datahub.operations.validation_failures")
        .with_description("Repository operations rejected by attribute validation")
        .init()
}

/// Lookups that found no record. Tracked apart from failures.
pub fn records_not_found() -> Counter<u64> {
    meter()
        .u64_counter("datahub.operations.not_found")
        .with_description("Repository lookups that found no record")
        .init()
}

/// Cache hits, labeled by entity and namespace kind (records/queries).
pub fn cache_hits() -> Counter<u64> {
    meter()
        .u64_counter("datahub.cache.hits")
        .with_description("Cache hits")
        .init()
}

/// Cache misses, labeled by entity and namespace kind (records/queries).
pub fn cache_misses() -> Counter<u64> {
    meter()
        .u64_counter("datahub.cache.misses")
        .with_description("Cache misses")
        .init()
}

/// Domain-change events handed to the publisher.
pub fn events_published() -> Counter<u64> {
    meter()
        .u64_counter("datahub.events.published")
        .with_description("Domain-change events published after successful writes")
        .init()
}

// Histograms

/// End-to-end operation duration in milliseconds, outcome included.
pub fn operation_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("datahub.operation.duration")
        .with_description("Repository operation duration in milliseconds")
        .with_unit("ms")
        .init()
}

/// Result-set sizes for list/find/join operations.
pub fn query_result_count() -> Histogram<u64> {
    meter()
        .u64_histogram("datahub.query.result_count")
        .with_description("Rows returned by query operations")
        .init()
}

// Gauges

/// Breaker state per (entity, class): 0=open, 1=half_open, 2=closed.
pub fn circuit_breaker_state() -> Gauge<u64> {
    meter()
        .u64_gauge("datahub.circuit_breaker.state")
        .with_description("Circuit breaker state (0=open, 1=half_open, 2=closed)")
        .init()
}

/// Initialize all data-access metrics eagerly so the first operation does
/// not pay instrument construction.
pub fn init() {
    let _ = operations_started();
    let _ = operations_succeeded();
    let _ = operations_failed();
    let _ = validation_failures();
    let _ = records_not_found();
    let _ = cache_hits();
    let _ = cache_misses();
    let _ = events_published();
    let _ = operation_duration();
    let _ = query_result_count();
    let _ = circuit_breaker_state();
}

// Recording helpers used by the repository facade.

pub fn record_started(entity: &str, operation: &str) {
    operations_started().add(
        1,
        &[
            KeyValue::new("entity", entity.to_string()),
            KeyValue::new("operation", operation.to_string()),
        ],
    );
}

/// Record the terminal outcome of an operation along with its duration.
pub fn record_outcome(entity: &str, operation: &str, outcome: &'static str, duration_ms: f64) {
    let attrs = [
        KeyValue::new("entity", entity.to_string()),
        KeyValue::new("operation", operation.to_string()),
        KeyValue::new("outcome", outcome),
    ];

    match outcome {
        "success" => operations_succeeded().add(1, &attrs[..2]),
        "validation_error" => validation_failures().add(1, &attrs[..2]),
        "not_found" => records_not_found().add(1, &attrs[..2]),
        _ => operations_failed().add(1, &attrs),
    }

    operation_duration().record(duration_ms, &attrs);
}

pub fn record_cache_hit(entity: &str, namespace_kind: &'static str) {
    cache_hits().add(
        1,
        &[
            KeyValue::new("entity", entity.to_string()),
            KeyValue::new("namespace", namespace_kind),
        ],
    );
}

pub fn record_cache_miss(entity: &str, namespace_kind: &'static str) {
    cache_misses().add(
        1,
        &[
            KeyValue::new("entity", entity.to_string()),
            KeyValue::new("namespace", namespace_kind),
        ],
    );
}

pub fn record_result_count(entity: &str, operation: &str, count: usize) {
    query_result_count().record(
        count as u64,
        &[
            KeyValue::new("entity", entity.to_string()),
            KeyValue::new("operation", operation.to_string()),
        ],
    );
}

pub fn record_event_published(entity: &str, event_name: &'static str) {
    events_published().add(
        1,
        &[
            KeyValue::new("entity", entity.to_string()),
            KeyValue::new("event", event_name),
        ],
    );
}

pub fn record_breaker_state(entity: &str, class: OperationClass, state: CircuitState) {
    circuit_breaker_state().record(
        state.gauge_value(),
        &[
            KeyValue::new("entity", entity.to_string()),
            KeyValue::new("class", class.as_str()),
        ],
    );
}
