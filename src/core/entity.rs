//! Entity identity: the kind namespace and the `(kind, name)` key.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// The namespace a named entity lives in.
///
/// Names are unique per kind; two kinds may reuse the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ecu,
    EcuPort,
    Connection,
    Switch,
    SwitchPort,
    Controller,
    ControllerInterface,
    Socket,
    ServiceInterface,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Ecu,
        EntityKind::EcuPort,
        EntityKind::Connection,
        EntityKind::Switch,
        EntityKind::SwitchPort,
        EntityKind::Controller,
        EntityKind::ControllerInterface,
        EntityKind::Socket,
        EntityKind::ServiceInterface,
    ];

    /// The identifier used in registry keys and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ecu => "ecu",
            EntityKind::EcuPort => "ecu_port",
            EntityKind::Connection => "connection",
            EntityKind::Switch => "switch",
            EntityKind::SwitchPort => "switch_port",
            EntityKind::Controller => "controller",
            EntityKind::ControllerInterface => "controller_interface",
            EntityKind::Socket => "socket",
            EntityKind::ServiceInterface => "service_interface",
        }
    }

    /// Human-readable name for messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Ecu => "ECU",
            EntityKind::EcuPort => "ECU port",
            EntityKind::Connection => "topology connection",
            EntityKind::Switch => "switch",
            EntityKind::SwitchPort => "switch port",
            EntityKind::Controller => "controller",
            EntityKind::ControllerInterface => "controller interface",
            EntityKind::Socket => "socket",
            EntityKind::ServiceInterface => "service interface",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown entity kind `{}` (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Identity of a named entity within one workspace load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        EntityKey {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    /// Formats as the registry key, `<kind>.<name>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}
