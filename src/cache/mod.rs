//! # Cache Store
//!
//! TTL-based key/value caching with two independent namespaces per entity:
//! individual records keyed by primary-key value, and query-result sets
//! keyed by a content digest of `(conditions, options)`. The store knows
//! nothing about storage or breaker logic; the repository facade owns the
//! cache-aside discipline (check before read, populate after fetch,
//! invalidate on write).

pub mod keys;
pub mod store;

pub use keys::{query_key, record_key};
pub use store::CacheStore;
