use std::time::{Duration, Instant};

/// Single-slot cache with a time-to-live. Callers pass `now` explicitly.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entry: Option<Entry<V>>,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value if it was stored less than `ttl` before `now`.
    pub fn get(&self, now: Instant) -> Option<V> {
        self.entry
            .as_ref()
            .filter(|e| now.saturating_duration_since(e.stored_at) < self.ttl)
            .map(|e| e.value.clone())
    }

    pub fn put(&mut self, value: V, now: Instant) {
        self.entry = Some(Entry {
            value,
            stored_at: now,
        });
    }

    /// Last stored value regardless of age.
    pub fn peek(&self) -> Option<&V> {
        self.entry.as_ref().map(|e| &e.value)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
