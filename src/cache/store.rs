//! In-memory TTL cache store.
//!
//! Namespaces are independent: records and query results for each entity
//! live in `{entity}:records` / `{entity}:queries` and never interfere with
//! other entities. Expiry is lazy: an expired entry is treated identically
//! to absence and evicted on the access that discovers it; no background
//! sweeper is required.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct NamespaceStore {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
}

impl NamespaceStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Make room for one more entry: expired entries go first, then the
    /// entry closest to expiry.
    fn evict_for_capacity(&self, now: Instant) {
        self.purge_expired(now);
        while self.entries.len() >= self.capacity {
            let closest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().expires_at)
                .map(|entry| entry.key().clone());
            match closest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Concurrent TTL key/value store with independent namespaces.
#[derive(Debug)]
pub struct CacheStore {
    namespaces: DashMap<String, Arc<NamespaceStore>>,
    default_capacity: usize,
}

impl CacheStore {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            namespaces: DashMap::new(),
            default_capacity,
        }
    }

    /// Pre-register a namespace with an explicit capacity. Idempotent; an
    /// existing namespace keeps its entries and capacity.
    pub fn configure_namespace(&self, namespace: &str, capacity: usize) {
        self.namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(NamespaceStore::new(capacity)));
    }

    fn namespace(&self, namespace: &str) -> Arc<NamespaceStore> {
        self.namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(NamespaceStore::new(self.default_capacity)))
            .clone()
    }

    /// Look up a key. An expired entry is evicted and reported as missing.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let ns = self.namespaces.get(namespace)?.clone();
        let now = Instant::now();

        let expired = match ns.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };

        if expired {
            ns.entries.remove(key);
            debug!(namespace = namespace, key = key, "cache entry expired");
        }
        None
    }

    /// Store a value with the given TTL, evicting for capacity if needed.
    pub fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) {
        let ns = self.namespace(namespace);
        let now = Instant::now();

        if !ns.entries.contains_key(key) && ns.entries.len() >= ns.capacity {
            ns.evict_for_capacity(now);
        }

        ns.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop a single key.
    pub fn invalidate(&self, namespace: &str, key: &str) {
        if let Some(ns) = self.namespaces.get(namespace) {
            ns.entries.remove(key);
        }
    }

    /// Drop every entry in a namespace.
    pub fn clear_namespace(&self, namespace: &str) {
        if let Some(ns) = self.namespaces.get(namespace) {
            ns.entries.clear();
        }
    }

    /// Live (non-expired) entry count for a namespace.
    pub fn size(&self, namespace: &str) -> usize {
        match self.namespaces.get(namespace) {
            Some(ns) => {
                ns.purge_expired(Instant::now());
                ns.entries.len()
            }
            None => 0,
        }
    }

    /// Drop expired entries everywhere.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        for ns in self.namespaces.iter() {
            ns.purge_expired(now);
        }
    }

    /// Drop everything in every namespace.
    pub fn clear_all(&self) {
        for ns in self.namespaces.iter() {
            ns.entries.clear();
        }
    }
}
