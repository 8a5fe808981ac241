//! Sharded TTL cache for resolved responses.
//!
//! Keys are hostnames. Each shard is independently locked; write locks are
//! held only around map updates. When an insert would push a shard over its
//! quota the entry with the earliest expiry is evicted first.

use crate::metrics::Metrics;
use dnsres_domain::DnsResponse;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

const DEFAULT_SHARDS: usize = 16;

/// Fixed per-entry overhead added on top of the string payload sizes.
const ENTRY_OVERHEAD: u64 = 64;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Arc<DnsResponse>,
    expires_at: Instant,
    size: u64,
}

#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<String, CacheEntry>,
    size: u64,
}

enum Lookup {
    Miss,
    Hit(Arc<DnsResponse>),
    Expired,
}

pub struct ShardedCache {
    shards: Vec<RwLock<Shard>>,
    shard_quota: u64,
    metrics: Arc<Metrics>,
}

impl ShardedCache {
    pub fn new(max_size: u64, num_shards: usize, metrics: Arc<Metrics>) -> Self {
        let num_shards = if num_shards == 0 {
            DEFAULT_SHARDS
        } else {
            num_shards
        };
        Self {
            shards: (0..num_shards).map(|_| RwLock::new(Shard::default())).collect(),
            shard_quota: max_size / num_shards as u64,
            metrics,
        }
    }

    pub fn with_default_shards(max_size: u64, metrics: Arc<Metrics>) -> Self {
        Self::new(max_size, DEFAULT_SHARDS, metrics)
    }

    /// Look up a live entry. Expired entries are removed on the way out.
    ///
    /// The aggregate hit/miss counters increment exactly once per call.
    pub fn get(&self, key: &str) -> Option<Arc<DnsResponse>> {
        let shard = self.shard_for(key);
        let now = Instant::now();

        let lookup = {
            let Ok(guard) = shard.read() else { return None };
            match guard.entries.get(key) {
                None => Lookup::Miss,
                Some(entry) if now < entry.expires_at => {
                    Lookup::Hit(Arc::clone(&entry.response))
                }
                Some(_) => Lookup::Expired,
            }
        };

        match lookup {
            Lookup::Hit(response) => {
                self.metrics.cache_hits_aggregate.inc();
                return Some(response);
            }
            Lookup::Miss => {
                self.metrics.cache_misses_aggregate.inc();
                return None;
            }
            Lookup::Expired => {}
        }

        // Expired: re-check under the write lock, another reader may have
        // removed it already.
        if let Ok(mut guard) = shard.write() {
            if guard
                .entries
                .get(key)
                .is_some_and(|entry| now >= entry.expires_at)
            {
                if let Some(entry) = guard.entries.remove(key) {
                    guard.size = guard.size.saturating_sub(entry.size);
                }
            }
        }
        self.metrics.cache_misses_aggregate.inc();
        self.update_size_gauge();
        None
    }

    /// Insert a response with the given TTL, evicting the earliest-expiring
    /// entry when the shard would exceed its quota.
    pub fn set(&self, key: &str, response: Arc<DnsResponse>, ttl: Duration) {
        let size = estimate_size(&response);
        let entry = CacheEntry {
            response,
            expires_at: Instant::now() + ttl,
            size,
        };

        let shard = self.shard_for(key);
        if let Ok(mut guard) = shard.write() {
            if guard.size + size > self.shard_quota {
                self.evict_oldest(&mut guard);
            }
            if let Some(old) = guard.entries.insert(key.to_string(), entry) {
                guard.size = guard.size.saturating_sub(old.size);
            }
            guard.size += size;
        }
        self.update_size_gauge();
    }

    pub fn delete(&self, key: &str) {
        let shard = self.shard_for(key);
        if let Ok(mut guard) = shard.write() {
            if let Some(entry) = guard.entries.remove(key) {
                guard.size = guard.size.saturating_sub(entry.size);
            }
        }
        self.update_size_gauge();
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            if let Ok(mut guard) = shard.write() {
                guard.entries.clear();
                guard.size = 0;
            }
        }
        self.update_size_gauge();
    }

    pub fn entry_count(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|shard| shard.read().ok().map(|guard| guard.entries.len()))
            .sum()
    }

    fn shard_for(&self, key: &str) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    fn evict_oldest(&self, shard: &mut Shard) {
        let oldest = shard
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            if let Some(entry) = shard.entries.remove(&key) {
                shard.size = shard.size.saturating_sub(entry.size);
            }
            self.metrics.cache_evictions_total.inc();
        }
    }

    // Recomputed from the live entry count after every structural change;
    // incremental tracking drifts under concurrent expiry.
    fn update_size_gauge(&self) {
        self.metrics.cache_size.set(self.entry_count() as f64);
    }
}

fn estimate_size(response: &DnsResponse) -> u64 {
    let payload = response.hostname.len()
        + response.server.len()
        + response
            .addresses
            .iter()
            .map(|addr| addr.len())
            .sum::<usize>();
    payload as u64 + ENTRY_OVERHEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(hostname: &str, addresses: &[&str], ttl: u32) -> Arc<DnsResponse> {
        Arc::new(DnsResponse {
            server: "8.8.8.8:53".to_string(),
            hostname: hostname.to_string(),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            ttl,
            ..Default::default()
        })
    }

    fn cache(max_size: u64, shards: usize) -> (ShardedCache, Arc<Metrics>) {
        let metrics = Metrics::new();
        (ShardedCache::new(max_size, shards, Arc::clone(&metrics)), metrics)
    }

    #[test]
    fn set_then_get_within_ttl_returns_same_response() {
        let (cache, metrics) = cache(4096, 1);
        let resp = response("example.com", &["1.2.3.4"], 60);
        cache.set("example.com", Arc::clone(&resp), Duration::from_secs(60));

        let hit = cache.get("example.com").expect("expected hit");
        assert!(Arc::ptr_eq(&hit, &resp));
        assert_eq!(hit.addresses, vec!["1.2.3.4"]);
        assert_eq!(metrics.cache_hits_aggregate.get(), 1);
        assert_eq!(metrics.cache_misses_aggregate.get(), 0);
    }

    #[test]
    fn absent_key_counts_one_miss() {
        let (cache, metrics) = cache(4096, 1);
        assert!(cache.get("nope.example").is_none());
        assert_eq!(metrics.cache_misses_aggregate.get(), 1);
    }

    #[test]
    fn expired_entry_is_removed_and_counted_as_miss() {
        let (cache, metrics) = cache(4096, 1);
        cache.set(
            "example.com",
            response("example.com", &["1.2.3.4"], 0),
            Duration::from_secs(0),
        );

        assert!(cache.get("example.com").is_none());
        assert_eq!(metrics.cache_misses_aggregate.get(), 1);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn eviction_removes_earliest_expiry_first() {
        // Two entries roughly fill the quota; the third insert must evict
        // the one that expires soonest.
        let (cache, metrics) = cache(260, 1);
        cache.set(
            "soon.example",
            response("soon.example", &["1.1.1.1"], 10),
            Duration::from_secs(10),
        );
        cache.set(
            "later.example",
            response("later.example", &["2.2.2.2"], 300),
            Duration::from_secs(300),
        );
        cache.set(
            "new.example",
            response("new.example", &["3.3.3.3"], 300),
            Duration::from_secs(300),
        );

        assert_eq!(metrics.cache_evictions_total.get(), 1);
        assert!(cache.get("soon.example").is_none());
        assert!(cache.get("later.example").is_some());
        assert!(cache.get("new.example").is_some());
    }

    #[test]
    fn oversized_entry_still_admits_exactly_one() {
        // Quota far below a single entry: the previous entry is evicted and
        // the new one is admitted anyway.
        let (cache, _) = cache(16, 1);
        cache.set(
            "first.example",
            response("first.example", &["1.1.1.1"], 60),
            Duration::from_secs(60),
        );
        cache.set(
            "second.example",
            response("second.example", &["2.2.2.2"], 60),
            Duration::from_secs(60),
        );

        assert_eq!(cache.entry_count(), 1);
        assert!(cache.get("second.example").is_some());
    }

    #[test]
    fn replacing_a_key_does_not_leak_size() {
        let (cache, _) = cache(4096, 1);
        for _ in 0..10 {
            cache.set(
                "example.com",
                response("example.com", &["1.2.3.4"], 60),
                Duration::from_secs(60),
            );
        }
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn size_gauge_tracks_entry_count() {
        let (cache, metrics) = cache(8192, 4);
        cache.set("a.example", response("a.example", &[], 60), Duration::from_secs(60));
        cache.set("b.example", response("b.example", &[], 60), Duration::from_secs(60));
        assert_eq!(metrics.cache_size.get(), 2.0);

        cache.delete("a.example");
        assert_eq!(metrics.cache_size.get(), 1.0);

        cache.clear();
        assert_eq!(metrics.cache_size.get(), 0.0);
    }
}
