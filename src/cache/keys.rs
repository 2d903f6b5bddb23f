//! Cache key derivation.
//!
//! Record keys are the stringified primary-key value. Query keys are a
//! SHA-256 digest over a canonical serialization of `(conditions, options)`:
//! conditions live in a `BTreeMap` so serialization visits fields in sorted
//! order, and options serialize in fixed declaration order. Two
//! semantically-identical condition maps built in different insertion
//! orders therefore always produce the same key.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::query::{Conditions, QueryOptions};

/// Key for an individual record in the `{entity}:records` namespace.
pub fn record_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct QueryKeySource<'a> {
    conditions: &'a Conditions,
    options: &'a QueryOptions,
}

/// Key for a query-result set in the `{entity}:queries` namespace.
pub fn query_key(conditions: &Conditions, options: &QueryOptions) -> String {
    let source = QueryKeySource {
        conditions,
        options,
    };
    let canonical = match serde_json::to_vec(&source) {
        Ok(bytes) => bytes,
        // Serialization of these plain structs cannot fail in practice;
        // fall back to the debug representation to stay deterministic.
        Err(_) => format!("{conditions:?}|{options:?}").into_bytes(),
    };

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}
