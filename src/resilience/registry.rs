//! Breaker registry: one independent state machine per
//! `(entity, operation class)` pair, created lazily from per-entity
//! configuration and torn down with the registry itself. Constructed once
//! at startup and threaded through the repository facade; tests build a
//! fresh registry instead of resetting shared state.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::DataAccessConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};

/// Independent failure budgets for reads and writes of the same entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Read,
    Write,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Read => "read",
            OperationClass::Write => "write",
        }
    }
}

/// Identity of a breaker within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakerKey {
    pub entity: String,
    pub class: OperationClass,
}

impl BreakerKey {
    pub fn new(entity: impl Into<String>, class: OperationClass) -> Self {
        Self {
            entity: entity.into(),
            class,
        }
    }
}

/// Registry-level transition listener: receives the entity, operation
/// class, and new state. Fire-and-forget; must not block.
pub type TransitionListener = Arc<dyn Fn(&str, OperationClass, CircuitState) + Send + Sync>;

/// Owns every breaker in the layer.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<BreakerKey, Arc<CircuitBreaker>>,
    config: DataAccessConfig,
    listener: Option<TransitionListener>,
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

impl CircuitBreakerRegistry {
    pub fn new(config: DataAccessConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            listener: None,
        }
    }

    /// Attach a listener invoked on every transition of every breaker.
    pub fn with_listener(mut self, listener: TransitionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Fetch (or lazily create) the breaker for an entity and operation
    /// class, honoring per-entity threshold overrides.
    pub fn breaker(&self, entity: &str, class: OperationClass) -> Arc<CircuitBreaker> {
        let key = BreakerKey::new(entity, class);
        self.breakers
            .entry(key)
            .or_insert_with(|| {
                let settings = self.config.breaker_settings_for(entity);
                let name = format!("{}:{}", entity, class.as_str());
                let mut breaker = CircuitBreaker::new(name, settings);
                if let Some(listener) = &self.listener {
                    let listener = Arc::clone(listener);
                    let entity = entity.to_string();
                    breaker = breaker.with_listener(Arc::new(move |state| {
                        listener(&entity, class, state);
                    }));
                }
                Arc::new(breaker)
            })
            .clone()
    }

    /// Force a single breaker back to closed with zeroed counters. Returns
    /// `false` when no breaker exists for the key yet.
    pub fn reset(&self, entity: &str, class: OperationClass) -> bool {
        match self.breakers.get(&BreakerKey::new(entity, class)) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Administrative recovery: reset every breaker.
    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.reset();
        }
    }

    /// Snapshot of every breaker's current state.
    pub fn states(&self) -> Vec<(BreakerKey, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}
