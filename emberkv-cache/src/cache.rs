//! Cache core: bounded LRU map with TTL checks and WAL integration.

use crate::codec::ValueCodec;
use crate::error::CacheError;
use crate::lru::{NodeIndex, RecencyList};
use emberkv_wal::{RecordType, Wal, WalConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime};

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of resident entries.
    pub capacity: usize,
    /// WAL configuration; `None` disables durability entirely.
    pub wal: Option<WalConfig>,
}

impl CacheConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            wal: None,
        }
    }

    pub fn with_wal(mut self, wal: WalConfig) -> Self {
        self.wal = Some(wal);
        self
    }
}

struct Entry<V> {
    value: V,
    /// Zero means no expiration.
    ttl: Duration,
    created_at: Instant,
    node: NodeIndex,
}

struct CacheState<V> {
    entries: HashMap<String, Entry<V>>,
    recency: RecencyList,
    capacity: usize,
}

impl<V> CacheState<V> {
    /// Inserts or overwrites a binding at the MRU end, evicting the LRU
    /// entry first when a new key would exceed capacity.
    fn apply_set(&mut self, key: &str, value: V, ttl: Duration, created_at: Instant) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
            entry.ttl = ttl;
            entry.created_at = created_at;
            let node = entry.node;
            self.recency.move_to_front(node);
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        let node = self.recency.push_front(key.to_string());
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                ttl,
                created_at,
                node,
            },
        );
        debug_assert_eq!(self.entries.len(), self.recency.len());
    }

    fn evict_lru(&mut self) {
        if let Some(key) = self.recency.pop_back() {
            self.entries.remove(&key);
        }
    }

    /// Removes a binding from both the map and the recency order.
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.recency.remove(entry.node);
                debug_assert_eq!(self.entries.len(), self.recency.len());
                true
            }
            None => false,
        }
    }
}

/// Durable bounded LRU cache.
///
/// A single exclusive lock guards the entry map and the recency order; `get`
/// takes it too, since a hit moves the key to the MRU end and may lazily
/// drop an expired entry. When a WAL is configured, every mutation is
/// appended (and flushed) before memory changes, so a failed append leaves
/// the cache exactly as it was.
pub struct Cache<C: ValueCodec> {
    state: Mutex<CacheState<C::Value>>,
    wal: Option<Wal>,
    codec: C,
}

impl<C: ValueCodec> Cache<C> {
    /// Opens the cache, replaying the WAL if one is configured.
    pub fn open(config: CacheConfig, codec: C) -> Result<Self, CacheError> {
        let wal = config.wal.map(Wal::open).transpose()?;

        let cache = Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                recency: RecencyList::new(),
                capacity: config.capacity,
            }),
            wal,
            codec,
        };

        cache.recover()?;
        Ok(cache)
    }

    /// Binds `key` to `value` with an optional TTL (zero = no expiration).
    pub fn set(&self, key: &str, value: C::Value, ttl: Duration) -> Result<(), CacheError> {
        let mut state = self.state.lock();

        let bytes = self.codec.encode(&value)?;
        let expires_at = if ttl > Duration::ZERO {
            unix_now_nanos() + ttl.as_nanos() as i64
        } else {
            0
        };

        if let Some(wal) = &self.wal {
            wal.append(RecordType::Set, key, bytes, expires_at)?;
        }

        state.apply_set(key, value, ttl, Instant::now());
        Ok(())
    }

    /// Looks up `key`, expiring it lazily if its TTL has run out.
    pub fn get(&self, key: &str) -> Option<C::Value>
    where
        C::Value: Clone,
    {
        let mut state = self.state.lock();

        let (node, hit) = {
            let entry = state.entries.get(key)?;
            if entry.ttl > Duration::ZERO && entry.created_at.elapsed() > entry.ttl {
                (entry.node, None)
            } else {
                (entry.node, Some(entry.value.clone()))
            }
        };

        match hit {
            Some(value) => {
                state.recency.move_to_front(node);
                Some(value)
            }
            None => {
                state.remove(key);
                None
            }
        }
    }

    /// Removes `key`. Deleting an absent key succeeds silently and writes
    /// nothing to the WAL.
    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.state.lock();

        if !state.entries.contains_key(key) {
            return Ok(());
        }

        if let Some(wal) = &self.wal {
            wal.append(RecordType::Delete, key, Vec::new(), 0)?;
        }

        state.remove(key);
        Ok(())
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes the WAL if one is configured. A second close errors.
    pub fn close(&self) -> Result<(), CacheError> {
        if let Some(wal) = &self.wal {
            wal.close()?;
        }
        Ok(())
    }

    /// Rebuilds in-memory state from the WAL's ordered record stream.
    ///
    /// `now` is captured once: a replayed entry's remaining lifetime equals
    /// whatever remained of its original lifetime at recovery time. Records
    /// that already expired are skipped, as are SETs whose value no longer
    /// decodes. Replay never appends back to the WAL.
    fn recover(&self) -> Result<(), CacheError> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };

        let records = wal.read_all()?;
        let total = records.len();

        let mut state = self.state.lock();
        let now = Instant::now();
        let now_nanos = unix_now_nanos();

        for record in records {
            match record.record_type {
                RecordType::Set => {
                    if record.expires_at_unix_nanos > 0
                        && now_nanos >= record.expires_at_unix_nanos
                    {
                        continue;
                    }

                    let value = match self.codec.decode(&record.value) {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::warn!(
                                key = %record.key,
                                "skipping record with unreadable value during replay: {e}"
                            );
                            continue;
                        }
                    };

                    let ttl = if record.expires_at_unix_nanos > 0 {
                        Duration::from_nanos((record.expires_at_unix_nanos - now_nanos) as u64)
                    } else {
                        Duration::ZERO
                    };

                    state.apply_set(&record.key, value, ttl, now);
                }
                RecordType::Delete => {
                    state.remove(&record.key);
                }
            }
        }

        if total > 0 {
            tracing::info!(
                records = total,
                live = state.entries.len(),
                "cache recovered from WAL"
            );
        }

        Ok(())
    }
}

fn unix_now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use std::thread::sleep;
    use tempfile::TempDir;

    /// Trivial codec for string values; invalid UTF-8 fails decoding.
    struct Utf8Codec;

    impl ValueCodec for Utf8Codec {
        type Value = String;

        fn encode(&self, value: &String) -> Result<Vec<u8>, CodecError> {
            Ok(value.as_bytes().to_vec())
        }

        fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| CodecError::InvalidEncoding(e.to_string()))
        }
    }

    fn volatile(capacity: usize) -> Cache<Utf8Codec> {
        Cache::open(CacheConfig::new(capacity), Utf8Codec).unwrap()
    }

    fn durable(capacity: usize, dir: &std::path::Path) -> Cache<Utf8Codec> {
        let config =
            CacheConfig::new(capacity).with_wal(WalConfig::new(dir).with_force_sync(true));
        Cache::open(config, Utf8Codec).unwrap()
    }

    fn assert_consistent(cache: &Cache<Utf8Codec>) {
        let state = cache.state.lock();
        let mut recency: Vec<_> = state.recency.keys();
        let mut entries: Vec<_> = state.entries.keys().cloned().collect();
        recency.sort();
        entries.sort();
        assert_eq!(recency, entries, "recency order and entry map diverged");
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = volatile(4);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_consistent(&cache);
    }

    #[test]
    fn test_delete_then_get_misses() {
        let cache = volatile(4);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        cache.delete("k").unwrap();
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_consistent(&cache);
    }

    #[test]
    fn test_delete_absent_key_is_silent() {
        let cache = volatile(4);
        cache.delete("missing").unwrap();
    }

    #[test]
    fn test_overwrite_updates_value_and_recency() {
        let cache = volatile(2);
        cache.set("a", "1".to_string(), Duration::ZERO).unwrap();
        cache.set("b", "2".to_string(), Duration::ZERO).unwrap();
        // Overwriting "a" makes it MRU, so "b" is the eviction candidate.
        cache.set("a", "1'".to_string(), Duration::ZERO).unwrap();
        cache.set("c", "3".to_string(), Duration::ZERO).unwrap();

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("1'".to_string()));
        assert_eq!(cache.get("c"), Some("3".to_string()));
        assert_consistent(&cache);
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = volatile(3);
        cache.set("a", "1".to_string(), Duration::ZERO).unwrap();
        cache.set("b", "2".to_string(), Duration::ZERO).unwrap();
        cache.set("c", "3".to_string(), Duration::ZERO).unwrap();
        cache.set("d", "4".to_string(), Duration::ZERO).unwrap();

        // "a" was LRU and got evicted by "d".
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("d"), Some("4".to_string()));

        // Touching "b" leaves "c" as LRU; inserting "e" evicts it.
        assert_eq!(cache.get("b"), Some("2".to_string()));
        cache.set("e", "5".to_string(), Duration::ZERO).unwrap();
        assert_eq!(cache.get("c"), None);
        assert_eq!(cache.len(), 3);
        assert_consistent(&cache);
    }

    #[test]
    fn test_capacity_bound_under_churn() {
        let cache = volatile(1000);
        for i in 0..2000 {
            cache
                .set(&format!("key-{i}"), format!("value-{i}"), Duration::ZERO)
                .unwrap();
            assert!(cache.len() <= 1000);
        }

        assert_eq!(cache.len(), 1000);
        // With no intervening reads, exactly the last thousand survive.
        assert_eq!(cache.get("key-999"), None);
        assert_eq!(cache.get("key-1000"), Some("value-1000".to_string()));
        assert_eq!(cache.get("key-1999"), Some("value-1999".to_string()));
        assert_consistent(&cache);
    }

    #[test]
    fn test_ttl_expires_on_access() {
        let cache = volatile(4);
        cache
            .set("k", "v".to_string(), Duration::from_millis(50))
            .unwrap();

        assert_eq!(cache.get("k"), Some("v".to_string()));

        sleep(Duration::from_millis(100));
        assert_eq!(cache.get("k"), None);
        // The expired entry was removed, not just hidden.
        assert_eq!(cache.len(), 0);
        assert_consistent(&cache);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let cache = volatile(4);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_recovery_replays_sets_and_deletes() {
        let dir = TempDir::new().unwrap();

        {
            let cache = durable(10, dir.path());
            for i in 1..=5 {
                cache
                    .set(&format!("k{i}"), format!("v{i}"), Duration::ZERO)
                    .unwrap();
            }
            cache.delete("k2").unwrap();
            cache.close().unwrap();
        }

        let cache = durable(10, dir.path());
        assert_eq!(cache.get("k2"), None);
        for i in [1, 3, 4, 5] {
            assert_eq!(cache.get(&format!("k{i}")), Some(format!("v{i}")));
        }
        assert_eq!(cache.len(), 4);
        assert_consistent(&cache);
    }

    #[test]
    fn test_recovery_preserves_lru_order() {
        let dir = TempDir::new().unwrap();

        {
            let cache = durable(3, dir.path());
            for key in ["a", "b", "c", "d", "e"] {
                cache.set(key, key.to_uppercase(), Duration::ZERO).unwrap();
            }
            cache.close().unwrap();
        }

        // Replay re-evicts under the same capacity: only c, d, e survive,
        // with c the LRU end.
        let cache = durable(3, dir.path());
        cache.set("f", "F".to_string(), Duration::ZERO).unwrap();

        assert_eq!(cache.get("c"), None);
        for key in ["d", "e", "f"] {
            assert_eq!(cache.get(key), Some(key.to_uppercase()));
        }
        assert_consistent(&cache);
    }

    #[test]
    fn test_recovery_skips_expired_records() {
        let dir = TempDir::new().unwrap();

        {
            let cache = durable(10, dir.path());
            cache
                .set("short", "lived".to_string(), Duration::from_millis(50))
                .unwrap();
            cache
                .set("keep", "me".to_string(), Duration::ZERO)
                .unwrap();
            cache.close().unwrap();
        }

        sleep(Duration::from_millis(100));

        let cache = durable(10, dir.path());
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("keep"), Some("me".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_recovery_keeps_remaining_lifetime() {
        let dir = TempDir::new().unwrap();

        {
            let cache = durable(10, dir.path());
            cache
                .set("k", "v".to_string(), Duration::from_millis(400))
                .unwrap();
            cache.close().unwrap();
        }

        let cache = durable(10, dir.path());
        // Still well within the original lifetime.
        assert_eq!(cache.get("k"), Some("v".to_string()));

        sleep(Duration::from_millis(500));
        // The replayed TTL kept ticking from the original deadline.
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_recovery_skips_undecodable_values() {
        let dir = TempDir::new().unwrap();

        {
            // Write a record whose value is not valid UTF-8 straight through
            // the WAL, bypassing the codec.
            let wal = Wal::open(WalConfig::new(dir.path()).with_force_sync(true)).unwrap();
            wal.append(RecordType::Set, "bad", vec![0xFF, 0xFE], 0)
                .unwrap();
            wal.append(RecordType::Set, "good", b"fine".to_vec(), 0)
                .unwrap();
            wal.close().unwrap();
        }

        let cache = durable(10, dir.path());
        assert_eq!(cache.get("bad"), None);
        assert_eq!(cache.get("good"), Some("fine".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_wal_failure_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let cache = durable(10, dir.path());

        cache.set("a", "1".to_string(), Duration::ZERO).unwrap();
        cache.close().unwrap();

        // The WAL is closed, so the append fails and memory must not change.
        assert!(cache.set("b", "2".to_string(), Duration::ZERO).is_err());
        assert!(cache.delete("a").is_err());

        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 1);
        assert_consistent(&cache);
    }

    #[test]
    fn test_close_twice_errors() {
        let dir = TempDir::new().unwrap();
        let cache = durable(10, dir.path());
        cache.close().unwrap();
        assert!(cache.close().is_err());
    }

    #[test]
    fn test_volatile_close_is_noop() {
        let cache = volatile(4);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        // Close without a WAL is a no-op and infallible, even twice.
        cache.close().unwrap();
        cache.close().unwrap();
    }

    #[test]
    fn test_force_sync_survives_drop_without_close() {
        let dir = TempDir::new().unwrap();

        {
            let cache = durable(10, dir.path());
            cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
            // Dropped without close: with force_sync every accepted set has
            // already been fsynced, so it must be visible after recovery.
        }

        let cache = durable(10, dir.path());
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }
}
