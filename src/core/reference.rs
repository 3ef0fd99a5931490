//! Unresolved pointers between entities.
//!
//! Building a document records a [`Reference`] for every name or id it points at.
//! Nothing is looked up until every document has been built and registered, so
//! forward references and references across documents are equally fine.

use std::fmt;

use serde::Serialize;

use crate::core::entity::{EntityKey, EntityKind};
use crate::core::location::Location;

/// How a reference names its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKey {
    Name(String),
    Id(u64),
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKey::Name(name) => write!(f, "`{}`", name),
            RefKey::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// Eventgroups a consumer expects the referenced service to offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventgroupDemand {
    pub names: Vec<String>,
    pub location: Location,
}

/// A pointer from one entity to another, recorded where it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// The entity holding the pointer
    pub owner: EntityKey,
    pub target: EntityKind,
    pub key: RefKey,
    /// Document and field the pointer was declared at
    pub location: Location,
    pub eventgroups: Option<EventgroupDemand>,
}

impl Reference {
    pub fn by_name(owner: EntityKey, target: EntityKind, name: impl Into<String>, location: Location) -> Self {
        Reference {
            owner,
            target,
            key: RefKey::Name(name.into()),
            location,
            eventgroups: None,
        }
    }

    pub fn by_id(owner: EntityKey, target: EntityKind, id: u64, location: Location) -> Self {
        Reference {
            owner,
            target,
            key: RefKey::Id(id),
            location,
            eventgroups: None,
        }
    }

    /// Ask the resolved target to offer these eventgroups.
    pub fn with_eventgroups(mut self, names: Vec<String>, location: Location) -> Self {
        if !names.is_empty() {
            self.eventgroups = Some(EventgroupDemand { names, location });
        }
        self
    }
}
