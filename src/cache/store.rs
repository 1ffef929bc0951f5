//! In-memory query cache.
//!
//! Owns every [`CacheEntry`]: created on first fetch, refreshed on refetch, marked
//! stale by prefix invalidation, evicted on TTL expiry or LRU pressure.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use lru::LruCache;
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::QueryKey;
use super::lock::{rw_read, rw_write};
use super::planner::InvalidationPlan;
use super::registry::KeyRegistry;

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT: &str = "querykey_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "querykey_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "querykey_cache_evict_total";
pub const METRIC_CACHE_STALE_MARKED: &str = "querykey_cache_stale_marked_total";

/// Notified once each time a cached entry turns stale.
///
/// Refetching is the listener's business; the cache never fetches on its own.
pub trait InvalidationListener: Send + Sync {
    fn on_invalidate(&self, key: &QueryKey);
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Wall-clock time of the last successful fetch.
    pub fetched_at: OffsetDateTime,
    pub stale: bool,
    pub subscribers: usize,
    loaded: Instant,
}

/// Result of a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup<V> {
    pub value: V,
    pub stale: bool,
    pub fetched_at: OffsetDateTime,
}

/// Outcome of [`QueryCache::begin_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTicket {
    /// No fetch for this key is in flight; the caller should perform it.
    Leader,
    /// An equal key is already being fetched; wait for its result instead.
    Follower,
}

struct Inner<V> {
    entries: LruCache<QueryKey, CacheEntry<V>>,
    registry: KeyRegistry,
    in_flight: HashSet<QueryKey>,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &QueryKey) -> Option<CacheEntry<V>> {
        self.registry.unregister(key);
        self.entries.pop(key)
    }
}

pub struct QueryCache<V> {
    config: CacheConfig,
    inner: RwLock<Inner<V>>,
    listeners: RwLock<Vec<Arc<dyn InvalidationListener>>>,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity_non_zero();
        Self {
            config,
            inner: RwLock::new(Inner {
                entries: LruCache::new(capacity),
                registry: KeyRegistry::new(),
                in_flight: HashSet::new(),
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn add_listener(&self, listener: Arc<dyn InvalidationListener>) {
        rw_write(&self.listeners, SOURCE, "add_listener").push(listener);
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        self.config
            .ttl()
            .is_some_and(|ttl| entry.loaded.elapsed() >= ttl)
    }

    /// Look up a key. Expired entries are evicted and reported as misses.
    pub fn get(&self, key: &QueryKey) -> Option<CacheLookup<V>> {
        let mut inner = rw_write(&self.inner, SOURCE, "get");

        let expired = match inner.entries.get(key) {
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
            Some(entry) => self.is_expired(entry),
        };
        if expired {
            inner.remove(key);
            counter!(METRIC_CACHE_MISS).increment(1);
            counter!(METRIC_CACHE_EVICT, "reason" => "ttl").increment(1);
            debug!(key = %key, "Query cache entry expired");
            return None;
        }

        counter!(METRIC_CACHE_HIT).increment(1);
        inner.entries.peek(key).map(|entry| CacheLookup {
            value: entry.value.clone(),
            stale: entry.stale,
            fetched_at: entry.fetched_at,
        })
    }

    /// Store a fetched value, creating the entry or refreshing it in place.
    ///
    /// Refreshing clears staleness and keeps the subscriber count. Also completes
    /// any in-flight fetch for the key.
    pub fn set(&self, key: QueryKey, value: V) {
        let mut inner = rw_write(&self.inner, SOURCE, "set");
        inner.in_flight.remove(&key);

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.fetched_at = OffsetDateTime::now_utc();
            entry.loaded = Instant::now();
            entry.stale = false;
            return;
        }

        let entry = CacheEntry {
            value,
            fetched_at: OffsetDateTime::now_utc(),
            stale: false,
            subscribers: 0,
            loaded: Instant::now(),
        };
        inner.registry.register(key.clone());
        if let Some((evicted, _)) = inner.entries.push(key, entry) {
            inner.registry.unregister(&evicted);
            counter!(METRIC_CACHE_EVICT, "reason" => "capacity").increment(1);
            debug!(key = %evicted, "Query cache entry evicted for capacity");
        }
    }

    /// Increment the subscriber count. Returns the new count, or `None` when the
    /// key has no entry yet.
    pub fn subscribe(&self, key: &QueryKey) -> Option<usize> {
        let mut inner = rw_write(&self.inner, SOURCE, "subscribe");
        inner.entries.peek_mut(key).map(|entry| {
            entry.subscribers += 1;
            entry.subscribers
        })
    }

    /// Decrement the subscriber count, saturating at zero.
    pub fn unsubscribe(&self, key: &QueryKey) -> Option<usize> {
        let mut inner = rw_write(&self.inner, SOURCE, "unsubscribe");
        inner.entries.peek_mut(key).map(|entry| {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.subscribers
        })
    }

    /// Claim the fetch for `key`; concurrent callers with an equal key become followers.
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        let mut inner = rw_write(&self.inner, SOURCE, "begin_fetch");
        if inner.in_flight.insert(key.clone()) {
            FetchTicket::Leader
        } else {
            FetchTicket::Follower
        }
    }

    /// Release an in-flight claim without storing a value (failed or cancelled fetch).
    pub fn abandon_fetch(&self, key: &QueryKey) {
        rw_write(&self.inner, SOURCE, "abandon_fetch")
            .in_flight
            .remove(key);
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        rw_read(&self.inner, SOURCE, "is_fetching")
            .in_flight
            .contains(key)
    }

    /// Mark every entry under `prefix` stale.
    ///
    /// Returns the number of entries that went from fresh to stale; entries that
    /// were already stale are left alone and listeners are not notified again.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let transitioned = {
            let mut inner = rw_write(&self.inner, SOURCE, "invalidate");
            let matching = inner.registry.keys_matching(prefix);
            let mut transitioned = Vec::new();
            for key in matching {
                if let Some(entry) = inner.entries.peek_mut(&key)
                    && !entry.stale
                {
                    entry.stale = true;
                    transitioned.push(key);
                }
            }
            transitioned
        };

        if !transitioned.is_empty() {
            counter!(METRIC_CACHE_STALE_MARKED).increment(transitioned.len() as u64);
            let listeners = rw_read(&self.listeners, SOURCE, "invalidate.listeners").clone();
            for key in &transitioned {
                for listener in listeners.iter() {
                    listener.on_invalidate(key);
                }
            }
        }

        debug!(prefix = %prefix, stale_marked = transitioned.len(), "Prefix invalidated");
        transitioned.len()
    }

    /// Apply every prefix of a plan; returns the total number of entries marked stale.
    pub fn invalidate_plan(&self, plan: &InvalidationPlan) -> usize {
        plan.prefixes().map(|prefix| self.invalidate(prefix)).sum()
    }

    /// Evict every entry under `prefix` outright.
    pub fn remove_matching(&self, prefix: &QueryKey) -> usize {
        let mut inner = rw_write(&self.inner, SOURCE, "remove_matching");
        let matching = inner.registry.keys_matching(prefix);
        let removed = matching
            .iter()
            .filter(|key| inner.remove(key).is_some())
            .count();
        if removed > 0 {
            counter!(METRIC_CACHE_EVICT, "reason" => "explicit").increment(removed as u64);
        }
        removed
    }

    /// Evict entries older than the configured TTL.
    pub fn evict_expired(&self) -> usize {
        if self.config.ttl().is_none() {
            return 0;
        }
        let mut inner = rw_write(&self.inner, SOURCE, "evict_expired");
        let expired: Vec<QueryKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        if !expired.is_empty() {
            counter!(METRIC_CACHE_EVICT, "reason" => "ttl").increment(expired.len() as u64);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and in-flight claim.
    pub fn clear(&self) {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        inner.entries.clear();
        inner.registry.clear();
        inner.in_flight.clear();
    }
}
