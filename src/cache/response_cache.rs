//! Shared LLM response cache.
//!
//! Wraps a [`RecencyCache`] behind a single mutex so each `get`/`set`/`clear`
//! is one serializable step for concurrent request tasks. Keys are
//! fingerprints of the inference inputs built by [`ResponseCache::fingerprint`].
//!
//! The cache is global: two users sending the same prompt with the same
//! `max_tokens` share one entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::recency::RecencyCache;
use crate::error::Result;

/// Thread-safe bounded LRU cache of generated responses.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<RecencyCache<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Capacity used when the config does not override it.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Create an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PortalError::Config`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            entries: Mutex::new(RecencyCache::new(capacity)?),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Build a deterministic cache key: SHA-256 of `(prompt, max_tokens)`.
    ///
    /// The prompt is length-prefixed, so no prompt text can be crafted to
    /// collide with a different `(prompt, max_tokens)` pair.
    pub fn fingerprint(prompt: &str, max_tokens: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update((prompt.len() as u64).to_le_bytes());
        hasher.update(prompt.as_bytes());
        hasher.update(max_tokens.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a cached response, refreshing its recency on a hit.
    pub fn get(&self, key: &str) -> Option<String> {
        let found = self.lock().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %short(key), "Response cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %short(key), "Response cache miss");
        }
        found
    }

    /// Store a response, evicting the least recently used entry if full.
    pub fn set(&self, key: String, response: String) {
        let evicted = self.lock().set(key, response);
        if let Some((old_key, _)) = evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %short(&old_key), "Evicted LRU cache entry");
        }
    }

    /// Remove all entries and return how many were dropped. Hit/miss
    /// counters are kept.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut guard = self.lock();
            let dropped = guard.len();
            guard.clear();
            dropped
        };
        debug!(dropped, "Response cache cleared");
        dropped
    }

    /// Number of entries currently cached.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Snapshot of the cache's size and cumulative counters.
    pub fn stats(&self) -> CacheStats {
        let (entries, capacity) = {
            let guard = self.lock();
            (guard.len(), guard.capacity())
        };
        CacheStats {
            entries,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    // Mutations never leave the list half-linked, so a poisoned lock still
    // guards a consistent structure.
    fn lock(&self) -> MutexGuard<'_, RecencyCache<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// First 8 characters of `key`, for log lines.
fn short(key: &str) -> &str {
    key.char_indices().nth(8).map_or(key, |(i, _)| &key[..i])
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries currently in the cache.
    pub entries: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries dropped to make room for new ones.
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use std::sync::Arc;

    #[test]
    fn test_fingerprint_deterministic() {
        let k1 = ResponseCache::fingerprint("hello", 100);
        let k2 = ResponseCache::fingerprint("hello", 100);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn test_fingerprint_token_aware() {
        let k1 = ResponseCache::fingerprint("hello", 100);
        let k2 = ResponseCache::fingerprint("hello", 101);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_fingerprint_prompt_aware() {
        let k1 = ResponseCache::fingerprint("hello", 100);
        let k2 = ResponseCache::fingerprint("goodbye", 100);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_fingerprint_no_separator_collision() {
        // A naive "{prompt}:{max_tokens}" key maps both of these to "a:1:2".
        let k1 = ResponseCache::fingerprint("a:1", 2);
        let k2 = ResponseCache::fingerprint("a", 12);
        assert_ne!(k1, k2);
        let k3 = ResponseCache::fingerprint("a:1:2", 0);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_new_rejects_zero_capacity() {
        assert!(matches!(
            ResponseCache::new(0),
            Err(PortalError::Config(_))
        ));
    }

    #[test]
    fn test_hit_miss_counted() {
        let cache = ResponseCache::new(4).unwrap();
        assert!(cache.get("k").is_none());
        cache.set("k".into(), "v".into());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 4);
    }

    #[test]
    fn test_empty_value_is_a_hit() {
        let cache = ResponseCache::new(4).unwrap();
        cache.set("k".into(), String::new());
        assert_eq!(cache.get("k"), Some(String::new()));
    }

    #[test]
    fn test_evictions_counted() {
        let cache = ResponseCache::new(2).unwrap();
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        cache.set("a".into(), "3".into());
        assert_eq!(cache.stats().evictions, 0);
        cache.set("c".into(), "4".into());
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = ResponseCache::new(2).unwrap();
        cache.set("a".into(), "1".into());
        let _ = cache.get("a");
        cache.clear();
        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.get("a").is_none());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_clear_returns_dropped_count() {
        let cache = ResponseCache::new(4).unwrap();
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn test_short_truncates_on_char_boundary() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
        assert_eq!(short("aéééééééé"), "aééééééé");
    }

    #[test]
    fn test_non_ascii_keys_with_debug_logging() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let cache = ResponseCache::new(1).unwrap();
        assert!(cache.get("aéééé").is_none());
        cache.set("aéééé".into(), "v".into());
        assert_eq!(cache.get("aéééé"), Some("v".to_string()));
        // Evicting the non-ASCII key logs it too.
        cache.set("ééééééééé".into(), "w".into());
        assert!(cache.get("aéééé").is_none());
    }

    #[test]
    fn test_default_capacity() {
        let cache = ResponseCache::new(ResponseCache::DEFAULT_CAPACITY).unwrap();
        assert_eq!(cache.capacity(), 256);
    }

    #[test]
    fn test_concurrent_access_respects_capacity() {
        const CAPACITY: usize = 16;
        const WORKERS: usize = 8;
        const OPS: usize = 2_000;

        let cache = Arc::new(ResponseCache::new(CAPACITY).unwrap());
        let handles: Vec<_> = (0..WORKERS)
            .map(|w| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..OPS {
                        // Overlapping key space across workers.
                        let key = format!("k{}", (i * 7 + w) % 40);
                        if i % 3 == 0 {
                            if let Some(v) = cache.get(&key) {
                                assert!(
                                    v.starts_with(&format!("{key}-")),
                                    "value belongs to its key"
                                );
                            }
                        } else {
                            cache.set(key.clone(), format!("{key}-w{w}-{i}"));
                        }
                        assert!(cache.size() <= CAPACITY);
                        if i % 500 == 499 && w == 0 {
                            cache.clear();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker must not panic");
        }

        assert!(cache.size() <= CAPACITY);
        let guard = cache.lock();
        let keys: Vec<&String> = guard.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), guard.len());
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "no duplicate keys");
        for (k, v) in guard.iter() {
            assert!(v.starts_with(&format!("{k}-")));
        }
    }
}
