use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedTarget {
    url: String,
    expires_at: Instant,
}

/// In-process `short_code -> original_url` cache used by the redirect path.
///
/// Readers take a [`generation`](LinkCache::generation) before loading a row
/// and hand it back to [`insert`](LinkCache::insert); any invalidation in
/// between makes the insert a no-op, so a row read before an update or
/// delete is never cached after it.
#[derive(Debug, Clone)]
pub struct LinkCache {
    entries: Arc<DashMap<String, CachedTarget>>,
    generation: Arc<AtomicU64>,
    ttl: Duration,
    capacity: usize,
}

impl LinkCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            ttl,
            capacity,
        }
    }

    pub fn get(&self, code: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(code) {
            if entry.expires_at > now {
                return Some(entry.url.clone());
            }
        }
        // Guard must be gone before removing or the shard deadlocks.
        self.entries.remove_if(code, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Caches `url` unless the cache was invalidated since `seen` was taken.
    pub fn insert(&self, code: &str, url: &str, seen: u64) {
        if self.capacity == 0 || self.ttl.is_zero() {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(code) {
            self.purge_expired();
            if self.entries.len() >= self.capacity {
                tracing::debug!("Link cache full, not caching {}", code);
                return;
            }
        }

        // The shard lock orders this check against `invalidate`'s remove.
        let entry = self.entries.entry(code.to_string());
        if self.generation() != seen {
            tracing::debug!("Link cache invalidated during lookup, not caching {}", code);
            return;
        }
        entry.insert(CachedTarget {
            url: url.to_string(),
            expires_at: Instant::now() + self.ttl,
        });
    }

    pub fn invalidate(&self, code: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(code);
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
