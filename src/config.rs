//! # Configuration Surface
//!
//! Settings consumed, not owned, by this layer: the embedding application
//! constructs a [`DataAccessConfig`] (from its own config files, environment,
//! or hardcoded test values) and hands it to the repository at startup.
//!
//! Feature toggles bypass components entirely: a disabled cache means every
//! read dispatches to storage, a disabled breaker means calls pass straight
//! through, disabled events/telemetry mean no publish/record calls at all.

use std::collections::HashMap;
use std::time::Duration;

/// Cache TTLs and capacity. TTLs are milliseconds to match the wire-level
/// configuration surface; accessors convert to [`Duration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// TTL for individual records keyed by primary key.
    pub record_ttl_ms: u64,
    /// TTL for query-result sets. Shorter than the record TTL because
    /// aggregate results go stale faster under concurrent writes.
    pub query_ttl_ms: u64,
    /// Maximum entries held per namespace before eviction kicks in.
    pub max_entries_per_namespace: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            record_ttl_ms: 300_000,
            query_ttl_ms: 60_000,
            max_entries_per_namespace: 10_000,
        }
    }
}

/// Circuit breaker thresholds shared by all breakers unless overridden
/// per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before probing recovery.
    pub reset_timeout_ms: u64,
    /// Consecutive half-open successes required to close again.
    pub half_open_threshold: u32,
}

impl BreakerSettings {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_threshold: 2,
        }
    }
}

/// Event publisher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSettings {
    /// Broadcast channel capacity; slow subscribers lag past this.
    pub channel_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// OTLP export settings for the metrics emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub service_name: String,
    pub otlp_endpoint: String,
    pub export_interval_seconds: u64,
    pub deployment_environment: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: "datahub-core".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            export_interval_seconds: 60,
            deployment_environment: "development".to_string(),
        }
    }
}

/// Per-entity overrides. Any field left `None` falls back to the global
/// setting of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityOverrides {
    pub record_ttl_ms: Option<u64>,
    pub query_ttl_ms: Option<u64>,
    pub max_entries_per_namespace: Option<usize>,
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
    pub half_open_threshold: Option<u32>,
}

/// Top-level configuration for the data-access layer.
#[derive(Debug, Clone)]
pub struct DataAccessConfig {
    pub cache_enabled: bool,
    pub circuit_breaker_enabled: bool,
    pub telemetry_enabled: bool,
    pub events_enabled: bool,
    pub cache: CacheSettings,
    pub circuit_breaker: BreakerSettings,
    pub events: EventSettings,
    pub telemetry: TelemetrySettings,
    pub entity_overrides: HashMap<String, EntityOverrides>,
}

impl Default for DataAccessConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            circuit_breaker_enabled: true,
            telemetry_enabled: false,
            events_enabled: true,
            cache: CacheSettings::default(),
            circuit_breaker: BreakerSettings::default(),
            events: EventSettings::default(),
            telemetry: TelemetrySettings::default(),
            entity_overrides: HashMap::new(),
        }
    }
}

impl DataAccessConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset. Invalid numeric values fall back to the
    /// default rather than failing startup; a malformed env var should not
    /// take the data path down.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.cache_enabled = env_bool("DATAHUB_CACHE_ENABLED", config.cache_enabled);
        config.circuit_breaker_enabled = env_bool(
            "DATAHUB_CIRCUIT_BREAKER_ENABLED",
            config.circuit_breaker_enabled,
        );
        config.telemetry_enabled = env_bool("TELEMETRY_ENABLED", config.telemetry_enabled);
        config.events_enabled = env_bool("DATAHUB_EVENTS_ENABLED", config.events_enabled);

        config.cache.record_ttl_ms =
            env_parse("DATAHUB_CACHE_RECORD_TTL_MS", config.cache.record_ttl_ms);
        config.cache.query_ttl_ms =
            env_parse("DATAHUB_CACHE_QUERY_TTL_MS", config.cache.query_ttl_ms);
        config.cache.max_entries_per_namespace = env_parse(
            "DATAHUB_CACHE_MAX_ENTRIES",
            config.cache.max_entries_per_namespace,
        );

        config.circuit_breaker.failure_threshold = env_parse(
            "DATAHUB_BREAKER_FAILURE_THRESHOLD",
            config.circuit_breaker.failure_threshold,
        );
        config.circuit_breaker.reset_timeout_ms = env_parse(
            "DATAHUB_BREAKER_RESET_TIMEOUT_MS",
            config.circuit_breaker.reset_timeout_ms,
        );
        config.circuit_breaker.half_open_threshold = env_parse(
            "DATAHUB_BREAKER_HALF_OPEN_THRESHOLD",
            config.circuit_breaker.half_open_threshold,
        );

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.telemetry.service_name = name;
        }
        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.telemetry.otlp_endpoint = endpoint;
        }
        if let Ok(environment) = std::env::var("DATAHUB_ENV") {
            config.telemetry.deployment_environment = environment;
        }

        config
    }

    /// Record-cache TTL for an entity, honoring overrides.
    pub fn record_ttl_for(&self, entity: &str) -> Duration {
        let ms = self
            .entity_overrides
            .get(entity)
            .and_then(|o| o.record_ttl_ms)
            .unwrap_or(self.cache.record_ttl_ms);
        Duration::from_millis(ms)
    }

    /// Query-cache TTL for an entity, honoring overrides.
    pub fn query_ttl_for(&self, entity: &str) -> Duration {
        let ms = self
            .entity_overrides
            .get(entity)
            .and_then(|o| o.query_ttl_ms)
            .unwrap_or(self.cache.query_ttl_ms);
        Duration::from_millis(ms)
    }

    /// Namespace capacity for an entity, honoring overrides.
    pub fn max_entries_for(&self, entity: &str) -> usize {
        self.entity_overrides
            .get(entity)
            .and_then(|o| o.max_entries_per_namespace)
            .unwrap_or(self.cache.max_entries_per_namespace)
    }

    /// Breaker thresholds for an entity, honoring overrides.
    pub fn breaker_settings_for(&self, entity: &str) -> BreakerSettings {
        let overrides = self.entity_overrides.get(entity);
        BreakerSettings {
            failure_threshold: overrides
                .and_then(|o| o.failure_threshold)
                .unwrap_or(self.circuit_breaker.failure_threshold),
            reset_timeout_ms: overrides
                .and_then(|o| o.reset_timeout_ms)
                .unwrap_or(self.circuit_breaker.reset_timeout_ms),
            half_open_threshold: overrides
                .and_then(|o| o.half_open_threshold)
                .unwrap_or(self.circuit_breaker.half_open_threshold),
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DataAccessConfig::default();
        assert!(config.cache_enabled);
        assert!(config.circuit_breaker_enabled);
        assert!(!config.telemetry_enabled);
        assert!(config.events_enabled);
        assert_eq!(config.cache.record_ttl_ms, 300_000);
        assert_eq!(config.cache.query_ttl_ms, 60_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn test_entity_overrides_fall_back_to_globals() {
        let mut config = DataAccessConfig::default();
        config.entity_overrides.insert(
            "widget".to_string(),
            EntityOverrides {
                record_ttl_ms: Some(1_000),
                failure_threshold: Some(2),
                ..Default::default()
            },
        );

        assert_eq!(
            config.record_ttl_for("widget"),
            Duration::from_millis(1_000)
        );
        // query TTL not overridden, falls back
        assert_eq!(config.query_ttl_for("widget"), Duration::from_millis(60_000));

        let breaker = config.breaker_settings_for("widget");
        assert_eq!(breaker.failure_threshold, 2);
        assert_eq!(breaker.reset_timeout_ms, 30_000);

        // unknown entity gets globals everywhere
        assert_eq!(
            config.record_ttl_for("gadget"),
            Duration::from_millis(300_000)
        );
        assert_eq!(config.breaker_settings_for("gadget").failure_threshold, 5);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("DATAHUB_TEST_PARSE", "not-a-number");
        let parsed: u64 = env_parse("DATAHUB_TEST_PARSE", 42);
        assert_eq!(parsed, 42);
        std::env::remove_var("DATAHUB_TEST_PARSE");
    }
}
