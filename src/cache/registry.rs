//! Entity-kind index over cached keys.
//!
//! Every prefix starts with an entity kind, so grouping cached keys by kind lets
//! prefix invalidation visit only that kind's keys instead of the whole cache.

use std::collections::{HashMap, HashSet};

use super::keys::QueryKey;

#[derive(Debug, Default)]
pub struct KeyRegistry {
    by_kind: HashMap<String, HashSet<QueryKey>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: QueryKey) {
        self.by_kind
            .entry(key.entity_kind().to_string())
            .or_default()
            .insert(key);
    }

    pub fn unregister(&mut self, key: &QueryKey) {
        if let Some(keys) = self.by_kind.get_mut(key.entity_kind()) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_kind.remove(key.entity_kind());
            }
        }
    }

    /// Registered keys falling under `prefix`.
    pub fn keys_matching(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        self.by_kind
            .get(prefix.entity_kind())
            .map(|keys| {
                keys.iter()
                    .filter(|key| key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.by_kind.clear();
    }

    pub fn kind_count(&self) -> usize {
        self.by_kind.len()
    }

    pub fn key_count(&self) -> usize {
        self.by_kind.values().map(HashSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::{EntityKind, FilterSet, Scope, derive_key};

    fn kind(name: &str) -> EntityKind {
        EntityKind::new(name).expect("valid kind")
    }

    #[test]
    fn register_and_match_by_prefix() {
        let mut registry = KeyRegistry::new();

        let list = derive_key("clients", Some(&Scope::List), None).expect("key");
        let detail = QueryKey::detail(&kind("clients"), "c1").expect("key");
        let case = derive_key("cases", Some(&Scope::List), None).expect("key");

        registry.register(list.clone());
        registry.register(detail.clone());
        registry.register(case);

        let mut all_clients = registry.keys_matching(&kind("clients").prefix());
        all_clients.sort();
        assert_eq!(all_clients, vec![detail.clone(), list]);

        assert_eq!(registry.keys_matching(&detail), vec![detail]);
        assert_eq!(registry.kind_count(), 2);
        assert_eq!(registry.key_count(), 3);
    }

    #[test]
    fn unregister_cleans_up_empty_kinds() {
        let mut registry = KeyRegistry::new();
        let key = QueryKey::detail(&kind("invoices"), "i1").expect("key");

        registry.register(key.clone());
        assert_eq!(registry.kind_count(), 1);

        registry.unregister(&key);
        assert_eq!(registry.kind_count(), 0);
        assert_eq!(registry.key_count(), 0);
    }

    #[test]
    fn filtered_lists_match_list_prefix() {
        let mut registry = KeyRegistry::new();
        let filters = FilterSet::new().with("status", "open").expect("filters");
        let filtered = derive_key("cases", Some(&Scope::List), Some(&filters)).expect("key");
        registry.register(filtered.clone());

        let list_prefix = derive_key("cases", Some(&Scope::List), None).expect("key");
        assert_eq!(registry.keys_matching(&list_prefix), vec![filtered]);

        registry.clear();
        assert!(registry.keys_matching(&list_prefix).is_empty());
    }
}
