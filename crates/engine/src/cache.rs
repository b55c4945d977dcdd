//! Fingerprint-keyed result cache.
//!
//! Avoids repeating deterministic node work when the same
//! `(kind, resolved config, inputs)` triple reappears within TTL.  The
//! cache is in-process and volatile; it is not part of durable state.
//! The internal mutex guards map mutations only and is never held across
//! an await point.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::NodeResult;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counter snapshot for observability endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

struct CacheEntry {
    result: NodeResult,
    inserted_at: Instant,
    expires_at: Instant,
    last_access: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

// ---------------------------------------------------------------------------
// ExecutionCache
// ---------------------------------------------------------------------------

/// LRU + TTL bounded memo of successful node results.
pub struct ExecutionCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    default_ttl: Duration,
}

impl ExecutionCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    /// Deterministic key for a node invocation: SHA-256 over the canonical
    /// JSON of `[kind, resolved_config, inputs]`.  `serde_json` maps keep
    /// their keys sorted, so equal triples always serialise identically.
    pub fn fingerprint(kind: &str, config: &Value, inputs: &Map<String, Value>) -> String {
        let payload = json!([kind, config, inputs]).to_string();
        format!("{kind}:{:x}", Sha256::digest(payload.as_bytes()))
    }

    /// Retrieve the stored result if present and not expired. Hits come
    /// back with `cached = true`; expired entries are removed on lookup.
    pub fn get(&self, key: &str) -> Option<NodeResult> {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_access = now;
                let mut result = entry.result.clone();
                result.cached = true;
                inner.hits += 1;
                debug!(key, "cache hit");
                Some(result)
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.misses += 1;
                debug!(key, "expired cache entry removed");
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a successful result with `ttl` (default TTL when `None`).
    /// Failed results are never stored.  At capacity the least recently
    /// used entry is evicted, ties broken by oldest insertion.
    pub fn put(&self, key: String, result: &NodeResult, ttl: Option<Duration>) {
        if !result.success {
            return;
        }

        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut inner = self.inner.lock().unwrap();

        while inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.last_access, e.inserted_at))
                .map(|(k, _)| k.clone());
            match victim {
                Some(victim) => {
                    inner.entries.remove(&victim);
                    debug!(key = victim, "evicted cache entry");
                }
                None => break,
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                result: result.clone(),
                inserted_at: now,
                expires_at: now + ttl,
                last_access: now,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ExecutionCache {
        ExecutionCache::new(1000, Duration::from_secs(3600))
    }

    fn result(value: Value) -> NodeResult {
        NodeResult::success(value, 5)
    }

    #[test]
    fn identical_triples_share_a_fingerprint() {
        let config = json!({ "b": 2, "a": 1 });
        let inputs = Map::new();
        let first = ExecutionCache::fingerprint("echo", &config, &inputs);
        let second = ExecutionCache::fingerprint("echo", &config, &inputs);
        assert_eq!(first, second);

        let other = ExecutionCache::fingerprint("echo", &json!({ "a": 1, "b": 3 }), &inputs);
        assert_ne!(first, other);
    }

    #[test]
    fn hit_comes_back_marked_cached() {
        let cache = cache();
        cache.put("k".into(), &result(json!("v")), None);

        let hit = cache.get("k").expect("stored entry");
        assert!(hit.cached);
        assert_eq!(hit.output, json!("v"));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 0, 1));
    }

    #[test]
    fn miss_increments_counter() {
        let cache = cache();
        assert!(cache.get("nothing").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn failed_results_are_never_stored() {
        let cache = cache();
        cache.put("k".into(), &NodeResult::failure("boom", 1), None);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn expired_entries_are_removed_on_lookup() {
        let cache = cache();
        cache.put("k".into(), &result(json!(1)), Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ExecutionCache::new(2, Duration::from_secs(3600));
        cache.put("first".into(), &result(json!(1)), None);
        std::thread::sleep(Duration::from_millis(2));
        cache.put("second".into(), &result(json!(2)), None);
        std::thread::sleep(Duration::from_millis(2));

        // Touch "first" so "second" becomes the LRU victim.
        cache.get("first");
        std::thread::sleep(Duration::from_millis(2));
        cache.put("third".into(), &result(json!(3)), None);

        assert!(cache.get("first").is_some());
        assert!(cache.get("second").is_none());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn clear_resets_everything() {
        let cache = cache();
        cache.put("k".into(), &result(json!(1)), None);
        cache.get("k");
        cache.clear();

        let stats = cache.stats();
        assert_eq!((stats.size, stats.hits, stats.misses), (0, 0, 0));
    }
}
