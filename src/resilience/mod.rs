//! # Resilience Module
//!
//! Fault isolation for the data path. Every storage call the repository
//! facade makes is routed through a circuit breaker owned by the
//! [`CircuitBreakerRegistry`]; each `(entity, operation class)` pair gets
//! its own independent failure budget so a failing write path cannot take
//! down reads, and a failing entity cannot take down its neighbors.
//!
//! Breaker decisions are synchronous and in-memory. The reset timeout is
//! evaluated lazily at call time; no background task opens or closes a
//! breaker.

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerError, CircuitState, StateListener,
};
pub use registry::{BreakerKey, CircuitBreakerRegistry, OperationClass, TransitionListener};
