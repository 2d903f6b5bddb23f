//! Circuit breaker behavior through the facade: fail-fast writes, cached
//! reads while open, per-class independence, and recovery.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use common::{attrs, communication_error, test_config, widget, MockStorage};
use datahub_core::config::{BreakerSettings, DataAccessConfig};
use datahub_core::error::DataAccessError;
use datahub_core::query::QueryOptions;
use datahub_core::repository::Repository;
use datahub_core::resilience::{CircuitState, OperationClass};

fn config_with(breaker: BreakerSettings) -> DataAccessConfig {
    DataAccessConfig {
        circuit_breaker: breaker,
        ..test_config()
    }
}

/// Full breaker lifecycle with failure_threshold=3, reset_timeout=1000ms:
/// three consecutive storage failures open the breaker, a fourth insert
/// inside the window fails fast without touching storage, and after the
/// window one insert reaches storage and (half_open_threshold=1) closes it
/// again.
#[tokio::test]
async fn test_write_breaker_lifecycle_scenario() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(
        storage.clone(),
        config_with(BreakerSettings {
            failure_threshold: 3,
            reset_timeout_ms: 1000,
            half_open_threshold: 1,
        }),
    );

    storage.fail_all(communication_error());
    for _ in 0..3 {
        let err = repo
            .insert(&widget(), attrs(json!({"name": "gear"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Storage(_)));
    }
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Open)
    );
    assert_eq!(storage.call_count("insert"), 3);

    // fourth call is short-circuited: storage is never touched
    let err = repo
        .insert(&widget(), attrs(json!({"name": "gear"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::ServiceUnavailable { .. }));
    assert_eq!(err.outcome(), "service_unavailable");
    assert_eq!(storage.call_count("insert"), 3);

    // after the reset timeout one probe reaches storage and closes the circuit
    tokio::time::sleep(Duration::from_millis(1050)).await;
    storage.heal();
    let record = repo
        .insert(&widget(), attrs(json!({"name": "gear"})))
        .await?;
    assert!(record.contains_key("id"));
    assert_eq!(storage.call_count("insert"), 4);
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Closed)
    );
    Ok(())
}

#[tokio::test]
async fn test_open_write_breaker_leaves_reads_alone() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(storage.clone(), test_config());

    let record = repo
        .insert(&widget(), attrs(json!({"name": "gear"})))
        .await?;
    let id = record["id"].clone();

    storage.fail_all(communication_error());
    for _ in 0..2 {
        let _ = repo.insert(&widget(), attrs(json!({"name": "x"}))).await;
    }
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Open)
    );

    // the read class has its own failure budget and is still closed
    assert_eq!(repo.breaker_state("widget", OperationClass::Read), None);

    // cached read still succeeds even though storage is down
    let fetched = repo.get(&widget(), &id).await?;
    assert_eq!(fetched["name"], json!("gear"));
    Ok(())
}

#[tokio::test]
async fn test_reads_prefer_cache_while_read_breaker_is_open() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(storage.clone(), test_config());

    // warm both cache namespaces
    let record = repo
        .insert(&widget(), attrs(json!({"name": "gear"})))
        .await?;
    let id = record["id"].clone();
    let listed = repo.list(&widget(), QueryOptions::new()).await?;
    assert_eq!(listed.len(), 1);

    // open the read breaker with lookups that bypass the cache
    storage.fail_all(communication_error());
    for _ in 0..2 {
        let _ = repo.get(&widget(), &json!(404)).await;
    }
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Read),
        Some(CircuitState::Open)
    );

    // cache-first ordering still serves warm reads
    assert_eq!(repo.get(&widget(), &id).await?["name"], json!("gear"));
    assert_eq!(repo.list(&widget(), QueryOptions::new()).await?.len(), 1);

    // a cold read fails fast without reaching storage
    let fetches_before = storage.call_count("fetch");
    let err = repo.get(&widget(), &json!(999)).await.unwrap_err();
    assert!(matches!(err, DataAccessError::ServiceUnavailable { .. }));
    assert_eq!(storage.call_count("fetch"), fetches_before);
    Ok(())
}

#[tokio::test]
async fn test_not_found_and_validation_do_not_count_as_failures() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(storage.clone(), test_config());

    for _ in 0..5 {
        let _ = repo.get(&widget(), &json!(404)).await;
        let _ = repo.insert(&widget(), attrs(json!({"count": 1}))).await;
    }

    assert_eq!(
        repo.breaker_state("widget", OperationClass::Read),
        Some(CircuitState::Closed)
    );
    // validation never even consulted the write breaker
    assert_eq!(repo.breaker_state("widget", OperationClass::Write), None);
    Ok(())
}

#[tokio::test]
async fn test_entities_have_independent_breakers() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(storage.clone(), test_config());

    let gadget = datahub_core::entity::EntityDescriptor::new("gadget", "id")
        .field(datahub_core::entity::FieldDescriptor::required(
            "name",
            datahub_core::entity::FieldKind::Text,
        ));

    storage.fail_all(communication_error());
    for _ in 0..2 {
        let _ = repo.insert(&widget(), attrs(json!({"name": "x"}))).await;
    }
    storage.heal();

    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Open)
    );

    // the other entity's writes are unaffected
    let record = repo.insert(&gadget, attrs(json!({"name": "y"}))).await?;
    assert!(record.contains_key("id"));
    Ok(())
}

#[tokio::test]
async fn test_half_open_failure_reopens_immediately() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(
        storage.clone(),
        config_with(BreakerSettings {
            failure_threshold: 1,
            reset_timeout_ms: 100,
            half_open_threshold: 1,
        }),
    );

    storage.fail_all(communication_error());
    let _ = repo.insert(&widget(), attrs(json!({"name": "x"}))).await;
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Open)
    );

    // probe after the timeout fails and the circuit reopens
    tokio::time::sleep(Duration::from_millis(120)).await;
    let err = repo
        .insert(&widget(), attrs(json!({"name": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::Storage(_)));
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Open)
    );

    // and the refreshed open window short-circuits again
    let err = repo
        .insert(&widget(), attrs(json!({"name": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::ServiceUnavailable { .. }));
    Ok(())
}

#[tokio::test]
async fn test_administrative_reset_restores_dispatch() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let repo = Repository::new(storage.clone(), test_config());

    storage.fail_all(communication_error());
    for _ in 0..2 {
        let _ = repo.insert(&widget(), attrs(json!({"name": "x"}))).await;
    }
    storage.heal();

    assert!(repo.reset_breaker("widget", OperationClass::Write));
    assert_eq!(
        repo.breaker_state("widget", OperationClass::Write),
        Some(CircuitState::Closed)
    );

    let record = repo
        .insert(&widget(), attrs(json!({"name": "gear"})))
        .await?;
    assert!(record.contains_key("id"));
    Ok(())
}

#[tokio::test]
async fn test_breaker_disabled_passes_failures_through() -> Result<()> {
    let storage = Arc::new(MockStorage::new());
    let config = DataAccessConfig {
        circuit_breaker_enabled: false,
        ..test_config()
    };
    let repo = Repository::new(storage.clone(), config);

    storage.fail_all(communication_error());
    for _ in 0..5 {
        let err = repo
            .insert(&widget(), attrs(json!({"name": "x"})))
            .await
            .unwrap_err();
        // never converted into a fail-fast rejection
        assert!(matches!(err, DataAccessError::Storage(_)));
    }

    // all five dispatched: no breaker ever interposed
    assert_eq!(storage.call_count("insert"), 5);
    assert!(repo.breaker_states().is_empty());
    Ok(())
}
