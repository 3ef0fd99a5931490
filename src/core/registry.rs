//! Name registry - per-kind uniqueness of names and ids.
//!
//! One registry lives for exactly one workspace load. Keys are `<kind>.<name>`,
//! compared case-sensitively. Numeric ids (service interface ids) get a separate
//! index scoped the same way.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::core::entity::{EntityKey, EntityKind};

/// A second entity of the same kind tried to take an existing name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate {} name `{}`", .kind.label(), .name)]
pub struct DuplicateNameError {
    pub kind: EntityKind,
    pub name: String,
}

/// A second entity of the same kind tried to take an existing id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate {} id {id} (already used by `{existing}`)", .kind.label())]
pub struct DuplicateIdError {
    pub kind: EntityKind,
    pub id: u64,
    pub existing: String,
}

/// Registry of every name and id taken during a load.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: BTreeSet<String>,
    ids: HashMap<(EntityKind, u64), String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        NameRegistry::default()
    }

    fn key(kind: EntityKind, name: &str) -> String {
        format!("{}.{}", kind, name)
    }

    /// Take a name for a kind.
    pub fn register(&mut self, kind: EntityKind, name: &str) -> Result<(), DuplicateNameError> {
        if self.names.insert(Self::key(kind, name)) {
            Ok(())
        } else {
            Err(DuplicateNameError {
                kind,
                name: name.to_string(),
            })
        }
    }

    /// Take an id for a kind; `name` is the entity that owns it.
    pub fn register_id(
        &mut self,
        kind: EntityKind,
        id: u64,
        name: &str,
    ) -> Result<(), DuplicateIdError> {
        if let Some(existing) = self.ids.get(&(kind, id)) {
            return Err(DuplicateIdError {
                kind,
                id,
                existing: existing.clone(),
            });
        }
        self.ids.insert((kind, id), name.to_string());
        Ok(())
    }

    /// Give back a name, e.g. when the id registration of the same entity failed.
    pub fn unregister(&mut self, kind: EntityKind, name: &str) {
        self.names.remove(&Self::key(kind, name));
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.names.contains(&Self::key(kind, name))
    }

    /// The name owning `id` within `kind`.
    pub fn lookup_id(&self, kind: EntityKind, id: u64) -> Option<&str> {
        self.ids.get(&(kind, id)).map(String::as_str)
    }

    /// Resolve a name to its key if it is registered.
    pub fn lookup(&self, kind: EntityKind, name: &str) -> Option<EntityKey> {
        self.contains(kind, name)
            .then(|| EntityKey::new(kind, name))
    }

    /// Every kind under which `name` is registered.
    pub fn kinds_of(&self, name: &str) -> Vec<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.contains(*kind, name))
            .collect()
    }

    /// All registered keys (`<kind>.<name>`), sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.ids.is_empty()
    }

    /// Forget every name and id of one kind.
    pub fn reset_kind(&mut self, kind: EntityKind) {
        let prefix = format!("{}.", kind);
        self.names.retain(|key| !key.starts_with(&prefix));
        self.ids.retain(|(k, _), _| *k != kind);
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.names.clear();
        self.ids.clear();
    }
}
