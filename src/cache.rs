//! TTL-bounded result cache
//!
//! Comparison reports are expensive to recompute and trace pairs are
//! frequently re-requested while an incident is being triaged. This cache
//! keeps recent results behind a mutex with lazy expiry: entries are dropped
//! when read after their deadline or when an insert finds the cache full.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe TTL cache with a capacity bound
///
/// `get` clones the value out so the lock is never held across caller code.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    capacity: usize,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Fetch a live entry, removing it if expired
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock leaves entries intact; keep
            // serving them.
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value with a per-entry TTL
    ///
    /// When the cache is at capacity, expired entries are evicted first; if
    /// none have expired, the entry closest to expiry is dropped.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let now = Instant::now();
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.capacity {
                // Still full; drop the soonest-to-expire entry.
                if let Some(min_deadline) = entries.values().map(|e| e.expires_at).min() {
                    let mut dropped = false;
                    entries.retain(|_, entry| {
                        if !dropped && entry.expires_at == min_deadline {
                            dropped = true;
                            false
                        } else {
                            true
                        }
                    });
                }
            }
            debug!(evicted = before - entries.len(), "cache eviction pass");
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
