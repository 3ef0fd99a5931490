//! Typed workspace objects.
//!
//! Every document kind has a builder implementing
//! [`FromNode`](crate::builder::reader::FromNode). Cross-document pointers stay plain
//! names or ids here; the resolver turns them into dependency edges.

pub mod controller;
pub mod datatypes;
pub mod filter;
pub mod metadata;
pub mod payload;
pub mod port;
pub mod security;
pub mod someip;
pub mod switch;
pub mod timesync;
pub mod topology;

use serde::Serialize;

use crate::core::entity::{EntityKey, EntityKind};
use crate::core::location::Location;

pub use controller::{Controller, ControllerInterface, Deployment, IpEndpoint, Socket, VirtualInterface};
pub use datatypes::{BaseVersion, GroupAddress, MacAddress, Version};
pub use filter::{FrameFilter, ValueMatch, Verdict};
pub use metadata::{EcuMetadata, EmbeddedMetadata, SystemMetadata};
pub use payload::{Datatype, Parameter};
pub use port::{EcuPort, MdiConfig, MiiConfig};
pub use security::{Firewall, MacsecConfig};
pub use someip::{Method, ServiceInterface};
pub use switch::{MulticastGroup, Switch, SwitchPort, TcamRule, Vlan};
pub use timesync::{PtpConfig, SyncConfig};
pub use topology::Connection;

/// An ECU, named after its directory under `ecus/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ecu {
    pub name: String,
    /// `None` when `ecu_metadata.flync.yaml` is missing or invalid
    pub metadata: Option<EcuMetadata>,
}

/// A topology connection together with the ECU whose topology declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcuConnection {
    pub ecu: String,
    #[serde(flatten)]
    pub connection: Connection,
}

impl EcuConnection {
    /// Connection ids are only unique within an ECU.
    pub fn scoped_id(&self) -> String {
        format!("{}/{}", self.ecu, self.connection.id())
    }
}

/// Any named object of a workspace.
///
/// Nested entities (ports of a switch, sockets of a controller) are also held by their
/// parent; the copy here is what the registry and the dependency graph refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Ecu(Ecu),
    EcuPort(EcuPort),
    Connection(EcuConnection),
    Switch(Switch),
    SwitchPort(SwitchPort),
    Controller(Controller),
    ControllerInterface(ControllerInterface),
    Socket(Socket),
    ServiceInterface(ServiceInterface),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Ecu(_) => EntityKind::Ecu,
            Entity::EcuPort(_) => EntityKind::EcuPort,
            Entity::Connection(_) => EntityKind::Connection,
            Entity::Switch(_) => EntityKind::Switch,
            Entity::SwitchPort(_) => EntityKind::SwitchPort,
            Entity::Controller(_) => EntityKind::Controller,
            Entity::ControllerInterface(_) => EntityKind::ControllerInterface,
            Entity::Socket(_) => EntityKind::Socket,
            Entity::ServiceInterface(_) => EntityKind::ServiceInterface,
        }
    }

    /// The registry name.
    pub fn name(&self) -> String {
        match self {
            Entity::Ecu(e) => e.name.clone(),
            Entity::EcuPort(p) => p.name.clone(),
            Entity::Connection(c) => c.scoped_id(),
            Entity::Switch(s) => s.name.clone(),
            Entity::SwitchPort(p) => p.name.clone(),
            Entity::Controller(c) => c.name.clone(),
            Entity::ControllerInterface(i) => i.name.clone(),
            Entity::Socket(s) => s.name.clone(),
            Entity::ServiceInterface(s) => s.name.clone(),
        }
    }

    /// Numeric id registered alongside the name.
    pub fn id(&self) -> Option<u64> {
        match self {
            Entity::ServiceInterface(s) => Some(u64::from(s.id)),
            _ => None,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.name())
    }
}

/// A built entity and where it was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRecord {
    pub key: EntityKey,
    pub location: Location,
    pub entity: Entity,
}

impl EntityRecord {
    pub fn new(entity: Entity, location: Location) -> Self {
        EntityRecord {
            key: entity.key(),
            location,
            entity,
        }
    }
}
