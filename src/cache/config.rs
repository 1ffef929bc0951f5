//! Cache configuration.
//!
//! Controls the in-memory query cache and the mutation event pipeline via the
//! `[cache]` section of `querykey.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1_000;
const DEFAULT_TTL_MS: u64 = 5 * 60 * 1_000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;
const DEFAULT_EVENT_QUEUE_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, mutation triggers are ignored.
    pub enabled: bool,
    /// Maximum entries held by the query cache.
    pub capacity: usize,
    /// Entry lifetime in milliseconds; 0 disables expiry.
    pub ttl_ms: u64,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
    /// Maximum pending mutation events before the oldest is dropped.
    pub event_queue_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            ttl_ms: DEFAULT_TTL_MS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
            event_queue_limit: DEFAULT_EVENT_QUEUE_LIMIT,
        }
    }
}

impl CacheConfig {
    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Events drained per batch, clamping to 1 if zero.
    pub fn consume_batch_limit_non_zero(&self) -> usize {
        self.consume_batch_limit.max(1)
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }
}
