//! Time-to-live cache for processed report results.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Entries expire `ttl` after insertion. Expired entries are dropped on
/// lookup, on every insert, or by [`TtlCache::purge_expired`].
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        entries.remove(key).map(|(_, v)| v)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, (stored, _)| now.duration_since(*stored) < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((stored, value)) if now.duration_since(*stored) < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert_at(&self, key: impl Into<String>, value: V, now: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            // Keys carry caller-chosen date ranges; sweep so the map stays bounded.
            let ttl = self.ttl;
            entries.retain(|_, (stored, _)| now.duration_since(*stored) < ttl);
            entries.insert(key.into(), (now, value));
        }
    }
}

/// Cache key for one property and date range.
pub fn report_cache_key(property_id: &str, start_date: &str, end_date: &str) -> String {
    format!("analytics_{}_{}_{}", property_id, start_date, end_date)
}
