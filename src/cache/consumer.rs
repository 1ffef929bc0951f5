//! Cache consumer.
//!
//! Drains mutation events, resolves them into an invalidation plan and marks the
//! matching cache entries stale. Refetching is left to whoever listens on the cache.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::planner::{InvalidationPlan, InvalidationResolver};
use super::store::QueryCache;

pub const METRIC_CONSUME_MS: &str = "querykey_consume_ms";

pub struct CacheConsumer<V> {
    config: CacheConfig,
    cache: Arc<QueryCache<V>>,
    queue: Arc<EventQueue>,
    resolver: InvalidationResolver,
}

impl<V: Clone> CacheConsumer<V> {
    pub fn new(
        config: CacheConfig,
        cache: Arc<QueryCache<V>>,
        queue: Arc<EventQueue>,
        resolver: InvalidationResolver,
    ) -> Self {
        Self {
            config,
            cache,
            queue,
            resolver,
        }
    }

    /// Consume one batch of pending events.
    ///
    /// Returns the applied plan, or `None` when the queue was empty.
    #[instrument(skip(self))]
    pub fn consume(&self) -> Option<InvalidationPlan> {
        let started_at = Instant::now();
        let events = self
            .queue
            .drain(self.config.consume_batch_limit_non_zero());
        if events.is_empty() {
            return None;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events, &self.resolver);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let stale_marked = self.cache.invalidate_plan(&plan);

        info!(
            event_count,
            prefixes = plan.len(),
            stale_marked,
            "Cache consumption complete"
        );

        histogram!(METRIC_CONSUME_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        Some(plan)
    }

    /// Consume until the queue is empty; returns the number of batches processed.
    pub fn consume_all(&self) -> usize {
        let mut batches = 0;
        while self.consume().is_some() {
            batches += 1;
        }
        batches
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<QueryCache<V>> {
        &self.cache
    }

    pub fn resolver(&self) -> &InvalidationResolver {
        &self.resolver
    }
}
