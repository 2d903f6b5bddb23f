//! # Event System
//!
//! Domain-change notifications emitted after successful writes.

pub mod publisher;

pub use publisher::{ChangeEvent, ChangeOperation, EventPublisher, PublishError};
