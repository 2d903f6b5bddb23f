//! # Repository Facade
//!
//! The single entry point for entity reads and writes. Orchestrates the
//! cache store, circuit breaker registry, query engine, storage
//! collaborator, event publisher, and metrics emitter:
//!
//! ```text
//! caller -> Repository -> (cache check) -> CircuitBreaker -> Storage
//!            \-> cache update / invalidation -> EventPublisher + metrics
//! ```

pub mod facade;
mod preload;

pub use facade::{DeletedRecord, Repository};
