//! # Circuit Breaker Implementation
//!
//! Fault isolation for storage calls. Classic three-state machine: Closed
//! (calls pass through, consecutive failures counted), Open (calls are
//! short-circuited until the reset timeout elapses), HalfOpen (probing
//! recovery; successes accumulate toward closing, any failure reopens).
//!
//! Open/closed decisions are made synchronously from in-memory counters;
//! the breaker never blocks on storage and no background timer exists. The
//! reset timeout is evaluated lazily against the wall clock at call time.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BreakerSettings;

/// Circuit breaker states. Discriminants are the metrics gauge encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Failure mode - all calls fail fast without executing
    Open = 0,
    /// Testing recovery - calls are attempted and successes counted
    HalfOpen = 1,
    /// Normal operation - all calls are allowed through
    Closed = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Closed => "closed",
        }
    }

    /// Value reported by the `circuit_breaker.state` gauge.
    pub fn gauge_value(&self) -> u64 {
        *self as u64
    }
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::HalfOpen,
            2 => CircuitState::Closed,
            // Default to the safest state
            _ => CircuitState::Open,
        }
    }
}

/// Errors produced by circuit breaker execution.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open and no fallback value was available.
    #[error("circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// The underlying operation ran and failed; the failure was counted.
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

/// Point-in-time view of a breaker's counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    pub open_for: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

/// Callback invoked on every state transition. Must not block; panics are
/// isolated so a broken listener cannot corrupt breaker state.
pub type StateListener = Arc<dyn Fn(CircuitState) + Send + Sync>;

/// Core circuit breaker with synchronous state decisions.
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,
    /// Current circuit state (atomic for cheap reads)
    state: AtomicU8,
    settings: BreakerSettings,
    /// Counters guarded by a synchronous lock so transitions are totally
    /// ordered within one breaker
    counters: Mutex<Counters>,
    listener: Option<StateListener>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: String, settings: BreakerSettings) -> Self {
        debug!(
            component = %name,
            failure_threshold = settings.failure_threshold,
            reset_timeout_ms = settings.reset_timeout_ms,
            half_open_threshold = settings.half_open_threshold,
            "circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            settings,
            counters: Mutex::new(Counters::default()),
            listener: None,
        }
    }

    /// Attach a state-transition listener (drives the state gauge).
    pub fn with_listener(mut self, listener: StateListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let counters = self.counters.lock();
        BreakerSnapshot {
            state: self.state(),
            consecutive_failures: counters.consecutive_failures,
            half_open_successes: counters.half_open_successes,
            open_for: counters.opened_at.map(|at| at.elapsed()),
        }
    }

    /// Execute an operation under breaker protection.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with_fallback(operation, None::<fn() -> Option<T>>)
            .await
    }

    /// Execute an operation under breaker protection, consulting `fallback`
    /// when the circuit is open. The fallback never runs the operation; it
    /// can only supply a substitute value (typically a cached one).
    pub async fn call_with_fallback<F, Fut, T, E, FB>(
        &self,
        operation: F,
        fallback: Option<FB>,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> Option<T>,
    {
        if !self.should_allow() {
            if let Some(fallback) = fallback {
                if let Some(value) = fallback() {
                    debug!(component = %self.name, "circuit open, serving fallback value");
                    return Ok(value);
                }
            }
            warn!(component = %self.name, "circuit open, call short-circuited");
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decide synchronously whether a call may proceed. An open circuit
    /// whose reset timeout has elapsed transitions to half-open here, on
    /// the calling thread.
    pub fn should_allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let mut counters = self.counters.lock();
                // Re-check under the lock so two racing callers agree
                if self.state() != CircuitState::Open {
                    return true;
                }
                match counters.opened_at {
                    Some(opened_at) if opened_at.elapsed() >= self.settings.reset_timeout() => {
                        self.transition(&mut counters, CircuitState::HalfOpen);
                        true
                    }
                    Some(_) => false,
                    None => {
                        // Open without a timestamp should not happen; allow
                        // the call rather than wedging the component
                        warn!(component = %self.name, "circuit open without timestamp");
                        true
                    }
                }
            }
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let mut counters = self.counters.lock();
        match self.state() {
            CircuitState::Closed => {
                counters.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                counters.half_open_successes += 1;
                if counters.half_open_successes >= self.settings.half_open_threshold {
                    self.transition(&mut counters, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                warn!(component = %self.name, "success recorded while circuit is open");
            }
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let mut counters = self.counters.lock();
        match self.state() {
            CircuitState::Closed => {
                counters.consecutive_failures += 1;
                if counters.consecutive_failures >= self.settings.failure_threshold {
                    self.transition(&mut counters, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while probing reopens immediately
                self.transition(&mut counters, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to closed with zeroed counters. Used for
    /// administrative recovery and test setup.
    pub fn reset(&self) {
        let mut counters = self.counters.lock();
        warn!(component = %self.name, "circuit breaker reset");
        self.transition(&mut counters, CircuitState::Closed);
    }

    fn transition(&self, counters: &mut Counters, next: CircuitState) {
        let previous = self.state();
        self.state.store(next as u8, Ordering::Release);

        match next {
            CircuitState::Open => {
                counters.opened_at = Some(Instant::now());
                counters.half_open_successes = 0;
            }
            CircuitState::HalfOpen => {
                counters.half_open_successes = 0;
            }
            CircuitState::Closed => {
                counters.consecutive_failures = 0;
                counters.half_open_successes = 0;
                counters.opened_at = None;
            }
        }

        info!(
            component = %self.name,
            from = previous.as_str(),
            to = next.as_str(),
            consecutive_failures = counters.consecutive_failures,
            "circuit breaker state transition"
        );

        self.notify(next);
    }

    /// Fire-and-forget listener notification; a panicking listener must
    /// never poison breaker state.
    fn notify(&self, state: CircuitState) {
        if let Some(listener) = &self.listener {
            let listener = Arc::clone(listener);
            let result = catch_unwind(AssertUnwindSafe(move || listener(state)));
            if result.is_err() {
                warn!(component = %self.name, "circuit breaker listener panicked");
            }
        }
    }
}
