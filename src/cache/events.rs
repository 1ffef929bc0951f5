//! Mutation events.
//!
//! Write paths publish a [`MutationEvent`] after a successful create, update or
//! delete; the consumer drains them in batches and turns them into invalidations.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::keys::EntityKind;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";
const DEFAULT_QUEUE_LIMIT: usize = 10_000;

pub const METRIC_EVENT_QUEUE_LEN: &str = "querykey_event_queue_len";
pub const METRIC_EVENT_DROPPED: &str = "querykey_event_dropped_total";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationAction {
    Created,
    Updated,
    Deleted,
}

/// A mutation that may have made cached views stale.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EntityKind,
    /// Record id when the caller knows exactly which record changed.
    pub entity_id: Option<String>,
    pub action: MutationAction,
    pub timestamp: OffsetDateTime,
}

impl MutationEvent {
    pub fn new(
        kind: EntityKind,
        entity_id: Option<String>,
        action: MutationAction,
        epoch: Epoch,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            entity_id,
            action,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Record id usable for detail-level invalidation.
    ///
    /// Creation always invalidates broadly since the new record shows up in lists.
    pub fn narrow_id(&self) -> Option<&str> {
        match self.action {
            MutationAction::Created => None,
            MutationAction::Updated | MutationAction::Deleted => self.entity_id.as_deref(),
        }
    }
}

/// Bounded in-memory FIFO of mutation events.
///
/// When full, the oldest event is dropped, logged and counted.
pub struct EventQueue {
    queue: Mutex<VecDeque<MutationEvent>>,
    epoch_counter: AtomicU64,
    limit: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::new_with_limit(DEFAULT_QUEUE_LIMIT)
    }

    /// Create a queue holding at most `limit` events (clamped to 1).
    pub fn new_with_limit(limit: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            limit: limit.max(1),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish a mutation, returning the enqueued event's id.
    pub fn publish(
        &self,
        kind: EntityKind,
        entity_id: Option<String>,
        action: MutationAction,
    ) -> Uuid {
        let epoch = self.next_epoch();
        let event = MutationEvent::new(kind, entity_id, action, epoch);
        let event_id = event.id;

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            entity_kind = %event.kind,
            entity_id = event.entity_id.as_deref().unwrap_or(""),
            action = ?event.action,
            "Mutation event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        if queue.len() >= self.limit
            && let Some(dropped) = queue.pop_front()
        {
            warn!(
                dropped_event_id = %dropped.id,
                dropped_entity_kind = %dropped.kind,
                limit = self.limit,
                "Mutation event queue full, dropping oldest event"
            );
            counter!(METRIC_EVENT_DROPPED).increment(1);
        }
        queue.push_back(event);
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        event_id
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<MutationEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(0.0);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
