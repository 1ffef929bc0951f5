//! Cache trigger.
//!
//! Entry point for write paths: publish a mutation and, optionally, apply the
//! resulting invalidation right away.

use std::sync::Arc;

use tracing::debug;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::error::InvalidKeyError;
use super::events::{EventQueue, MutationAction};
use super::keys::EntityKind;

/// Publishes mutation events on behalf of data-fetching hooks.
///
/// ```ignore
/// // After the API confirms an invoice update:
/// trigger.updated("invoices", Some(&invoice.id))?;
/// ```
pub struct CacheTrigger<V> {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer<V>>,
}

impl<V: Clone> CacheTrigger<V> {
    pub fn new(
        config: CacheConfig,
        queue: Arc<EventQueue>,
        consumer: Arc<CacheConsumer<V>>,
    ) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish a mutation; consume immediately when `consume_now` is set.
    ///
    /// The entity kind is validated even when the cache is disabled.
    pub fn trigger(
        &self,
        kind: impl AsRef<str>,
        entity_id: Option<&str>,
        action: MutationAction,
        consume_now: bool,
    ) -> Result<(), InvalidKeyError> {
        let kind = EntityKind::new(kind)?;
        if !self.config.enabled {
            debug!(entity_kind = %kind, ?action, "Cache trigger skipped: cache disabled");
            return Ok(());
        }

        self.queue
            .publish(kind, entity_id.map(str::to_string), action);

        if consume_now {
            self.consumer.consume();
        }
        Ok(())
    }

    pub fn created(&self, kind: impl AsRef<str>) -> Result<(), InvalidKeyError> {
        self.trigger(kind, None, MutationAction::Created, true)
    }

    pub fn updated(
        &self,
        kind: impl AsRef<str>,
        entity_id: Option<&str>,
    ) -> Result<(), InvalidKeyError> {
        self.trigger(kind, entity_id, MutationAction::Updated, true)
    }

    pub fn deleted(
        &self,
        kind: impl AsRef<str>,
        entity_id: Option<&str>,
    ) -> Result<(), InvalidKeyError> {
        self.trigger(kind, entity_id, MutationAction::Deleted, true)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<CacheConsumer<V>> {
        &self.consumer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::deps::DependencyTable;
    use crate::cache::keys::{QueryKey, Scope, derive_key};
    use crate::cache::planner::InvalidationResolver;
    use crate::cache::store::QueryCache;

    fn create_trigger(config: CacheConfig) -> CacheTrigger<&'static str> {
        let cache = Arc::new(QueryCache::new(config.clone()));
        let queue = Arc::new(EventQueue::new());
        let table = DependencyTable::from_raw([("clients", vec!["cases"])]).expect("table");
        let consumer = Arc::new(CacheConsumer::new(
            config.clone(),
            cache,
            queue.clone(),
            InvalidationResolver::new(table),
        ));
        CacheTrigger::new(config, queue, consumer)
    }

    #[test]
    fn trigger_publishes_event() {
        let trigger = create_trigger(CacheConfig::default());
        assert!(trigger.queue.is_empty());

        trigger
            .trigger("clients", None, MutationAction::Updated, false)
            .expect("valid kind");

        assert_eq!(trigger.queue.len(), 1);
    }

    #[test]
    fn trigger_respects_disabled_config() {
        let trigger = create_trigger(CacheConfig {
            enabled: false,
            ..Default::default()
        });

        trigger.created("clients").expect("valid kind");
        assert!(trigger.queue.is_empty());
    }

    #[test]
    fn trigger_rejects_malformed_kind() {
        let trigger = create_trigger(CacheConfig::default());
        assert_eq!(
            trigger.created(""),
            Err(InvalidKeyError::EmptyEntityKind)
        );
        assert!(trigger.queue.is_empty());
    }

    #[test]
    fn convenience_methods_consume_immediately() {
        let trigger = create_trigger(CacheConfig::default());
        let cache = trigger.consumer().cache().clone();

        let detail = QueryKey::detail(&"clients".parse().expect("kind"), "c1").expect("key");
        let cases = derive_key("cases", Some(&Scope::List), None).expect("key");
        cache.set(detail.clone(), "Acme");
        cache.set(cases.clone(), "cases");

        trigger.updated("clients", Some("c1")).expect("valid kind");
        assert!(trigger.queue.is_empty());
        assert!(cache.get(&detail).expect("cached").stale);
        assert!(cache.get(&cases).expect("cached").stale);

        trigger.deleted("invoices", Some("i1")).expect("valid kind");
        trigger.created("hearings").expect("valid kind");
        assert!(trigger.queue.is_empty());
    }
}
