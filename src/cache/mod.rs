//! Query-key and cache-invalidation scheme.
//!
//! - **Keys**: [`derive_key`] turns an entity kind, optional scope and optional
//!   filters into a canonical [`QueryKey`].
//! - **Invalidation**: [`InvalidationResolver`] turns mutated kinds into a minimal
//!   [`InvalidationPlan`], expanding one hop through a [`DependencyTable`].
//! - **Store**: [`QueryCache`] owns cached entries and marks them stale by prefix.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! capacity = 1000
//! ttl_ms = 300000
//!
//! [dependencies]
//! clients = ["cases", "invoices"]
//! ```

mod config;
mod consumer;
pub mod deps;
mod error;
mod events;
mod keys;
mod lock;
mod planner;
mod registry;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use consumer::CacheConsumer;
pub use deps::{DependencyTable, DependencyTableBuilder};
pub use error::InvalidKeyError;
pub use events::{Epoch, EventQueue, MutationAction, MutationEvent};
pub use keys::{
    DETAIL_SCOPE, EntityKind, FilterSet, FilterValue, KeySegment, LIST_SCOPE, QueryKey, Scope,
    derive_key,
};
pub use planner::{InvalidationPlan, InvalidationResolver, InvalidationTarget};
pub use registry::KeyRegistry;
pub use store::{CacheEntry, CacheLookup, FetchTicket, InvalidationListener, QueryCache};
pub use trigger::CacheTrigger;

/// Metric names emitted by this module, for describing them up front.
pub mod metric_names {
    pub use super::consumer::METRIC_CONSUME_MS as CONSUME_MS;
    pub use super::events::{
        METRIC_EVENT_DROPPED as EVENT_DROPPED, METRIC_EVENT_QUEUE_LEN as EVENT_QUEUE_LEN,
    };
    pub use super::store::{
        METRIC_CACHE_EVICT as CACHE_EVICT, METRIC_CACHE_HIT as CACHE_HIT,
        METRIC_CACHE_MISS as CACHE_MISS, METRIC_CACHE_STALE_MARKED as CACHE_STALE_MARKED,
    };
}
