//! Invalidation planning.
//!
//! Turns mutated entity kinds (or a batch of mutation events) into the minimal
//! set of key prefixes whose cache entries must be marked stale.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::deps::DependencyTable;
use super::error::InvalidKeyError;
use super::events::MutationEvent;
use super::keys::{EntityKind, QueryKey};

/// One mutated entity kind, optionally narrowed to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationTarget {
    pub kind: EntityKind,
    pub entity_id: Option<String>,
}

impl InvalidationTarget {
    pub fn kind(kind: EntityKind) -> Self {
        Self {
            kind,
            entity_id: None,
        }
    }

    pub fn record(kind: EntityKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: Some(entity_id.into()),
        }
    }
}

/// Set of key prefixes to invalidate.
///
/// Kept minimal: a prefix already covered by a broader prefix in the plan is
/// never stored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    prefixes: BTreeSet<QueryKey>,
}

impl InvalidationPlan {
    /// Add a prefix unless a broader one already covers it; drops any prefixes the
    /// new one covers.
    pub fn insert(&mut self, prefix: QueryKey) -> bool {
        if self.prefixes.iter().any(|existing| prefix.starts_with(existing)) {
            return false;
        }
        self.prefixes.retain(|existing| !existing.starts_with(&prefix));
        self.prefixes.insert(prefix)
    }

    pub fn contains(&self, prefix: &QueryKey) -> bool {
        self.prefixes.contains(prefix)
    }

    /// True when `key` falls under any prefix in the plan.
    pub fn covers(&self, key: &QueryKey) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &QueryKey> {
        self.prefixes.iter()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn merge(&mut self, other: InvalidationPlan) {
        for prefix in other.prefixes {
            self.insert(prefix);
        }
    }

    /// Merge a batch of events into one plan, ignoring duplicate event ids.
    pub fn from_events(events: Vec<MutationEvent>, resolver: &InvalidationResolver) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            let target = InvalidationTarget {
                entity_id: event.narrow_id().map(str::to_string),
                kind: event.kind,
            };
            // An empty record id cannot form a detail key; widen to the whole kind.
            match resolver.resolve_target(&target) {
                Ok(resolved) => plan.merge(resolved),
                Err(_) => plan.merge(resolver.resolve_kind(&target.kind)),
            }
        }

        plan
    }
}

impl IntoIterator for InvalidationPlan {
    type Item = QueryKey;
    type IntoIter = std::collections::btree_set::IntoIter<QueryKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.prefixes.into_iter()
    }
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidationPlan {{ prefixes: [")?;
        for (index, prefix) in self.prefixes.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{prefix}")?;
        }
        write!(f, "] }}")
    }
}

/// Computes invalidation prefixes using an injected [`DependencyTable`].
///
/// Expansion through the table is exactly one hop: dependents of dependents are
/// never visited.
#[derive(Debug, Clone, Default)]
pub struct InvalidationResolver {
    table: DependencyTable,
}

impl InvalidationResolver {
    pub fn new(table: DependencyTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &DependencyTable {
        &self.table
    }

    /// Resolve a mutation of `kind`, narrowed to one record when `entity_id` is given.
    pub fn resolve(
        &self,
        kind: impl AsRef<str>,
        entity_id: Option<&str>,
    ) -> Result<InvalidationPlan, InvalidKeyError> {
        let kind = EntityKind::new(kind)?;
        self.resolve_target(&InvalidationTarget {
            kind,
            entity_id: entity_id.map(str::to_string),
        })
    }

    /// Resolve several mutated kinds at once.
    pub fn resolve_all(
        &self,
        targets: &[InvalidationTarget],
    ) -> Result<InvalidationPlan, InvalidKeyError> {
        let mut plan = InvalidationPlan::default();
        for target in targets {
            plan.merge(self.resolve_target(target)?);
        }
        Ok(plan)
    }

    /// Whole-kind invalidation: `[kind]` plus `[dependent]` for each direct dependent.
    pub fn resolve_kind(&self, kind: &EntityKind) -> InvalidationPlan {
        let mut plan = InvalidationPlan::default();
        plan.insert(kind.prefix());
        self.push_dependents(kind, &mut plan);
        plan
    }

    pub fn resolve_target(
        &self,
        target: &InvalidationTarget,
    ) -> Result<InvalidationPlan, InvalidKeyError> {
        let mut plan = InvalidationPlan::default();
        match target.entity_id.as_deref() {
            Some(id) => {
                plan.insert(QueryKey::detail(&target.kind, id)?);
            }
            None => {
                plan.insert(target.kind.prefix());
            }
        }
        self.push_dependents(&target.kind, &mut plan);
        Ok(plan)
    }

    fn push_dependents(&self, kind: &EntityKind, plan: &mut InvalidationPlan) {
        for dependent in self.table.dependents_of(kind) {
            plan.insert(dependent.prefix());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::events::MutationAction;
    use crate::cache::keys::{Scope, derive_key};

    fn kind(name: &str) -> EntityKind {
        EntityKind::new(name).expect("valid kind")
    }

    fn resolver() -> InvalidationResolver {
        InvalidationResolver::new(
            DependencyTable::builder()
                .depends(kind("clients"), kind("cases"))
                .depends(kind("cases"), kind("hearings"))
                .build(),
        )
    }

    fn prefixes(plan: &InvalidationPlan) -> Vec<String> {
        plan.prefixes().map(ToString::to_string).collect()
    }

    #[test]
    fn one_hop_expansion() {
        let plan = resolver().resolve("clients", None).expect("plan");
        assert_eq!(prefixes(&plan), vec![r#"["cases"]"#, r#"["clients"]"#]);
        assert!(!plan.contains(&kind("hearings").prefix()));
    }

    #[test]
    fn unknown_kind_invalidates_itself_only() {
        let plan = resolver().resolve("unknownKind", None).expect("plan");
        assert_eq!(prefixes(&plan), vec![r#"["unknownKind"]"#]);
    }

    #[test]
    fn malformed_kind_is_an_error() {
        assert_eq!(
            resolver().resolve("", None),
            Err(InvalidKeyError::EmptyEntityKind)
        );
    }

    #[test]
    fn record_id_narrows_own_prefix_only() {
        let plan = resolver().resolve("clients", Some("c123")).expect("plan");
        assert_eq!(
            prefixes(&plan),
            vec![r#"["cases"]"#, r#"["clients","detail","c123"]"#]
        );

        let other_detail = QueryKey::detail(&kind("clients"), "c9").expect("key");
        assert!(!plan.covers(&other_detail));
        let list = derive_key("cases", Some(&Scope::List), None).expect("key");
        assert!(plan.covers(&list));
    }

    #[test]
    fn broad_prefix_subsumes_narrow_ones() {
        let mut plan = InvalidationPlan::default();
        assert!(plan.insert(QueryKey::detail(&kind("clients"), "c1").expect("key")));
        assert!(plan.insert(kind("clients").prefix()));
        assert!(!plan.insert(QueryKey::detail(&kind("clients"), "c2").expect("key")));
        assert_eq!(prefixes(&plan), vec![r#"["clients"]"#]);
    }

    #[test]
    fn resolve_all_merges_targets() {
        let plan = resolver()
            .resolve_all(&[
                InvalidationTarget::record(kind("cases"), "k1"),
                InvalidationTarget::kind(kind("clients")),
            ])
            .expect("plan");
        // `[cases]` from the clients hop covers the `cases` detail prefix.
        assert_eq!(
            prefixes(&plan),
            vec![r#"["cases"]"#, r#"["clients"]"#, r#"["hearings"]"#]
        );
    }

    #[test]
    fn plan_from_events_dedupes_and_merges() {
        let resolver = resolver();
        let update = MutationEvent::new(
            kind("cases"),
            Some("k1".to_string()),
            MutationAction::Updated,
            0,
        );
        let create = MutationEvent::new(
            kind("hearings"),
            Some("h1".to_string()),
            MutationAction::Created,
            1,
        );

        let plan =
            InvalidationPlan::from_events(vec![update.clone(), update, create], &resolver);
        assert_eq!(
            prefixes(&plan),
            vec![r#"["cases","detail","k1"]"#, r#"["hearings"]"#]
        );
    }

    #[test]
    fn display_format() {
        let plan = resolver().resolve("unknownKind", None).expect("plan");
        assert_eq!(
            plan.to_string(),
            r#"InvalidationPlan { prefixes: [["unknownKind"]] }"#
        );
        assert!(InvalidationPlan::default().is_empty());
    }
}
