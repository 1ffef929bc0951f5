//! Cross-entity dependency table.
//!
//! Maps an entity kind to the other kinds whose cached views embed or derive from
//! it, e.g. `clients -> {cases, invoices}` because case lists show client names.
//! The table is plain data handed to the resolver; nothing here is global.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::error::InvalidKeyError;
use super::keys::EntityKind;

/// Immutable mapping from a mutated kind to its dependent kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyTable {
    edges: BTreeMap<EntityKind, BTreeSet<EntityKind>>,
}

impl DependencyTable {
    /// An empty table: every mutation invalidates its own kind only.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> DependencyTableBuilder {
        DependencyTableBuilder::default()
    }

    /// Build a table from raw names, validating every kind.
    pub fn from_raw<I, K, D, S>(raw: I) -> Result<Self, InvalidKeyError>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = Self::builder();
        for (kind, dependents) in raw {
            let kind = EntityKind::new(kind)?;
            for dependent in dependents {
                builder = builder.depends(kind.clone(), EntityKind::new(dependent)?);
            }
            builder = builder.declare(kind);
        }
        Ok(builder.build())
    }

    /// Kinds whose views must be invalidated alongside `kind`. Empty when `kind` is
    /// not in the table.
    pub fn dependents_of(&self, kind: &EntityKind) -> impl Iterator<Item = &EntityKind> {
        self.edges.get(kind).into_iter().flatten()
    }

    pub fn contains(&self, kind: &EntityKind) -> bool {
        self.edges.contains_key(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityKind, &BTreeSet<EntityKind>)> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DependencyTableBuilder {
    edges: BTreeMap<EntityKind, BTreeSet<EntityKind>>,
}

impl DependencyTableBuilder {
    /// Record that views of `dependent` embed data from `kind`.
    ///
    /// Self-references are ignored: a kind always invalidates itself.
    pub fn depends(mut self, kind: EntityKind, dependent: EntityKind) -> Self {
        let entry = self.edges.entry(kind.clone()).or_default();
        if dependent != kind {
            entry.insert(dependent);
        }
        self
    }

    /// Make `kind` known to the table without adding dependents.
    pub fn declare(mut self, kind: EntityKind) -> Self {
        self.edges.entry(kind).or_default();
        self
    }

    pub fn build(self) -> DependencyTable {
        DependencyTable { edges: self.edges }
    }
}
