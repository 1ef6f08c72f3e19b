//! Bounded memoization with least-recently-used eviction
//!
//! `MemoCache` backs both the S3 download cache and the dataset loader
//! cache. Entries are keyed by string, evicted once `capacity` is
//! exceeded, and concurrent misses for the same key share one load.
//! Failed loads are never stored, so the next caller retries.
//!
//! Recency is measured by an injectable [`Clock`] so tests can drive
//! eviction order explicitly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Source of recency stamps
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Strictly increasing counter; the default clock
#[derive(Debug, Default)]
pub struct CounterClock(AtomicU64);

impl Clock for CounterClock {
    fn now(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn set(&self, t: u64) {
        self.0.store(t, Ordering::Relaxed);
    }

    pub fn advance(&self, by: u64) {
        _ = self.0.fetch_add(by, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct Slot<V> {
    value: V,
    stamp: u64,
    // tie-breaker for equal clock readings
    seq: u64,
}

/// Plain LRU map, no locking
pub struct Lru<V> {
    capacity: usize,
    clock: Arc<dyn Clock>,
    seq: u64,
    entries: HashMap<String, Slot<V>>,
}

impl<V: Clone> Lru<V> {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            clock,
            seq: 0,
            entries: HashMap::new(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Look up and mark as most recently used
    pub fn get(&mut self, key: &str) -> Option<V> {
        let stamp = self.clock.now();
        let seq = self.next_seq();
        let slot = self.entries.get_mut(key)?;
        slot.stamp = stamp;
        slot.seq = seq;
        Some(slot.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert, returning the evicted entry if capacity was exceeded
    pub fn insert(&mut self, key: String, value: V) -> Option<(String, V)> {
        let stamp = self.clock.now();
        let seq = self.next_seq();

        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, slot)| (slot.stamp, slot.seq))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                evicted = self.entries.remove(&victim).map(|slot| (victim, slot.value));
            }
        }

        _ = self.entries.insert(key, Slot { value, stamp, seq });
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Counters since construction
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

/// Async get-or-load cache with per-key load coalescing
pub struct MemoCache<V> {
    name: &'static str,
    lru: Mutex<Lru<V>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl<V: Clone + Send> MemoCache<V> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self::with_clock(name, capacity, Arc::new(CounterClock::default()))
    }

    pub fn with_clock(name: &'static str, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            lru: Mutex::new(Lru::new(capacity, clock)),
            inflight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Return the cached value for `key`, or run `load` and cache its success
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }

        let guard = self.acquire(key).await;

        // Another caller may have finished the load while we waited.
        if let Some(value) = self.lookup(key).await {
            self.release(key, guard).await;
            return Ok(value);
        }

        _ = self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let name = self.name;
        diagnostics::debug!("{name} cache miss for {key}", name: name, key: key);

        let result = load().await;
        if let Ok(value) = &result {
            let evicted = self.lru.lock().await.insert(key.to_string(), value.clone());
            _ = self.counters.inserts.fetch_add(1, Ordering::Relaxed);
            if let Some((victim, _)) = evicted {
                _ = self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                diagnostics::debug!("{name} cache evicted {victim}", name: name, victim: victim);
            }
        }

        self.release(key, guard).await;
        result
    }

    /// Cached value without loading; counts as a use
    pub async fn get(&self, key: &str) -> Option<V> {
        self.lru.lock().await.get(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.lru.lock().await.contains(key)
    }

    pub async fn len(&self) -> usize {
        self.lru.lock().await.len()
    }

    pub async fn clear(&self) {
        self.lru.lock().await.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    async fn lookup(&self, key: &str) -> Option<V> {
        let value = self.lru.lock().await.get(key);
        if value.is_some() {
            _ = self.counters.hits.fetch_add(1, Ordering::Relaxed);
            let name = self.name;
            diagnostics::debug!("{name} cache hit for {key}", name: name, key: key);
        }
        value
    }

    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    async fn release(&self, key: &str, guard: OwnedMutexGuard<()>) {
        let mut inflight = self.inflight.lock().await;
        drop(guard);
        let idle = inflight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            _ = inflight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut lru = Lru::new(2, Arc::new(CounterClock::default()));
        assert!(lru.insert("a".into(), 1).is_none());
        assert!(lru.insert("b".into(), 2).is_none());
        assert_eq!(lru.get("a"), Some(1));

        let evicted = lru.insert("c".into(), 3);
        assert_eq!(evicted, Some(("b".to_string(), 2)));
        assert!(lru.contains("a"));
        assert!(lru.contains("c"));
    }

    #[test]
    fn test_lru_reinsert_does_not_evict() {
        let mut lru = Lru::new(2, Arc::new(CounterClock::default()));
        _ = lru.insert("a".into(), 1);
        _ = lru.insert("b".into(), 2);
        assert!(lru.insert("a".into(), 10).is_none());
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.get("a"), Some(10));
    }

    #[test]
    fn test_manual_clock_controls_order() {
        let clock = Arc::new(ManualClock::default());
        let mut lru = Lru::new(2, clock.clone());

        clock.set(100);
        _ = lru.insert("old".into(), 1);
        clock.set(50);
        // stamped earlier than "old" even though inserted later
        _ = lru.insert("older".into(), 2);
        clock.set(200);

        let evicted = lru.insert("new".into(), 3);
        assert_eq!(evicted.map(|(k, _)| k), Some("older".to_string()));
    }

    #[test]
    fn test_equal_stamps_fall_back_to_insertion_order() {
        let clock = Arc::new(ManualClock::default());
        let mut lru = Lru::new(2, clock);
        _ = lru.insert("first".into(), 1);
        _ = lru.insert("second".into(), 2);
        let evicted = lru.insert("third".into(), 3);
        assert_eq!(evicted.map(|(k, _)| k), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_memo_loads_once() {
        let cache: MemoCache<u32> = MemoCache::new("test", 4);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with("k", || async {
                    _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .expect("load");
            assert_eq!(v, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.inserts, 1);
    }

    #[tokio::test]
    async fn test_memo_does_not_cache_failures() {
        let cache: MemoCache<u32> = MemoCache::new("test", 4);

        let err = cache
            .get_or_try_insert_with("k", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(err, Err("boom".to_string()));
        assert!(!cache.contains("k").await);

        let ok = cache
            .get_or_try_insert_with("k", || async { Ok::<_, String>(1) })
            .await;
        assert_eq!(ok, Ok(1));
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_memo_coalesces_concurrent_misses() {
        let cache: Arc<MemoCache<u32>> = Arc::new(MemoCache::new("test", 4));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert_with("shared", || async move {
                        _ = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join"), Ok(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.inflight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_memo_eviction_counts() {
        let cache: MemoCache<usize> = MemoCache::new("test", 2);
        for i in 0..5 {
            _ = cache
                .get_or_try_insert_with(&format!("k{i}"), || async move { Ok::<_, ()>(i) })
                .await;
        }
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.stats().evictions, 3);
        assert!(cache.contains("k4").await);
        assert!(cache.contains("k3").await);
        assert!(!cache.contains("k0").await);
    }
}
