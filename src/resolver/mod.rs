//! Reference resolution.
//!
//! Runs after every document is built and every entity registered. Each
//! [`Reference`] is looked up by kind and name (or kind and id); hits become
//! dependency edges, misses become [`LinkError`]s. Resolution is pure: the registry
//! and the entities are only read.

pub mod errors;
pub mod resolve;

pub use errors::LinkError;
pub use resolve::DependencyGraph;

use std::collections::HashMap;

use tracing::debug;

use crate::core::entity::{EntityKey, EntityKind};
use crate::core::model::{Entity, ServiceInterface};
use crate::core::reference::{RefKey, Reference};
use crate::core::registry::NameRegistry;

/// Looks references up against one load's registry.
pub struct Resolver<'a> {
    registry: &'a NameRegistry,
    services: HashMap<&'a str, &'a ServiceInterface>,
}

impl<'a> Resolver<'a> {
    /// `entities` are the registered entities; service interfaces among them are
    /// consulted for eventgroup checks.
    pub fn new(registry: &'a NameRegistry, entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        let services = entities
            .into_iter()
            .filter_map(|entity| match entity {
                Entity::ServiceInterface(service) => Some((service.name.as_str(), service)),
                _ => None,
            })
            .collect();
        Resolver { registry, services }
    }

    /// Find the entity a reference denotes.
    pub fn resolve(&self, reference: &Reference) -> Result<EntityKey, LinkError> {
        let target = reference.target;
        match &reference.key {
            RefKey::Name(name) => {
                if let Some(key) = self.registry.lookup(target, name) {
                    return Ok(key);
                }
                let found = self.registry.kinds_of(name);
                if found.is_empty() {
                    Err(LinkError::Unresolved {
                        target,
                        key: reference.key.clone(),
                        location: reference.location.clone(),
                        similar: self.similar_names(target, name),
                    })
                } else {
                    Err(LinkError::KindMismatch {
                        expected: target,
                        name: name.clone(),
                        found,
                        location: reference.location.clone(),
                    })
                }
            }
            RefKey::Id(id) => match self.registry.lookup_id(target, *id) {
                Some(name) => Ok(EntityKey::new(target, name)),
                None => Err(LinkError::Unresolved {
                    target,
                    key: reference.key.clone(),
                    location: reference.location.clone(),
                    similar: Vec::new(),
                }),
            },
        }
    }

    /// Eventgroups a consumer asks for must exist on the resolved service.
    pub fn check_eventgroups(&self, reference: &Reference, resolved: &EntityKey) -> Result<(), LinkError> {
        let Some(demand) = &reference.eventgroups else {
            return Ok(());
        };
        let Some(service) = self.services.get(resolved.name.as_str()) else {
            return Ok(());
        };
        let missing: Vec<String> = demand
            .names
            .iter()
            .filter(|name| service.eventgroup(name).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LinkError::MissingEventgroups {
                service: service.name.clone(),
                missing,
                location: demand.location.clone(),
            })
        }
    }

    /// Resolve every reference, adding an edge per hit. Returns the misses in
    /// reference order.
    pub fn link(&self, references: &[Reference], graph: &mut DependencyGraph) -> Vec<LinkError> {
        let mut errors = Vec::new();
        for reference in references {
            match self.resolve(reference) {
                Ok(target) => {
                    graph.add_edge(&reference.owner, &target, reference.location.clone());
                    if let Err(err) = self.check_eventgroups(reference, &target) {
                        errors.push(err);
                    }
                }
                Err(err) => {
                    debug!("unresolved reference at {}: {}", reference.location, err);
                    errors.push(err);
                }
            }
        }
        errors
    }

    fn similar_names(&self, kind: EntityKind, name: &str) -> Vec<String> {
        let prefix = format!("{}.", kind);
        self.registry
            .names()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(str::to_string)
            .collect()
    }
}
