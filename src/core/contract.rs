//! The directory contract a workspace must follow.
//!
//! ```text
//! <root>/system_metadata.flync.yaml
//! <root>/ecus/<ecu>/ecu_metadata.flync.yaml
//! <root>/ecus/<ecu>/ports.flync.yaml
//! <root>/ecus/<ecu>/topology.flync.yaml
//! <root>/ecus/<ecu>/controllers/*.flync.yaml     (directory mandatory, one or more)
//! <root>/ecus/<ecu>/switches/*.flync.yaml        (optional)
//! <root>/general/someip/services/*.flync.yaml    (optional)
//! ```

use std::fmt;

use serde::Serialize;

/// Suffix every workspace document carries.
pub const DOCUMENT_EXTENSION: &str = ".flync.yaml";

/// Name of the root metadata document.
pub const SYSTEM_METADATA: &str = "system_metadata.flync.yaml";

/// Directory holding one subdirectory per ECU.
pub const ECUS_DIR: &str = "ecus";

/// Directory holding service interface documents, relative to the root.
pub const SERVICES_DIR: &str = "general/someip/services";

/// What a document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SystemMetadata,
    EcuMetadata,
    EcuPorts,
    EcuTopology,
    Controller,
    Switch,
    ServiceInterface,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::SystemMetadata => "system-metadata",
            DocumentKind::EcuMetadata => "ecu-metadata",
            DocumentKind::EcuPorts => "ecu-ports",
            DocumentKind::EcuTopology => "ecu-topology",
            DocumentKind::Controller => "controller",
            DocumentKind::Switch => "switch",
            DocumentKind::ServiceInterface => "service-interface",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a slot's documents live, relative to its base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRule {
    /// A single file with a fixed name
    File(&'static str),
    /// Every `*.flync.yaml` file directly inside a subdirectory
    Glob { dir: &'static str },
}

/// How many documents a slot takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ExactlyOne,
    OneOrMore,
    ZeroOrMore,
}

/// Which directory a slot's path rule is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotScope {
    /// The workspace root
    Root,
    /// Each `ecus/<ecu>/` directory
    Ecu,
}

/// One position in the directory contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSlot {
    pub kind: DocumentKind,
    pub scope: SlotScope,
    pub rule: PathRule,
    pub cardinality: Cardinality,
    /// For glob rules: a missing directory aborts the load
    pub dir_required: bool,
}

impl DocumentSlot {
    const fn file(kind: DocumentKind, scope: SlotScope, name: &'static str) -> Self {
        DocumentSlot {
            kind,
            scope,
            rule: PathRule::File(name),
            cardinality: Cardinality::ExactlyOne,
            dir_required: false,
        }
    }

    const fn glob(
        kind: DocumentKind,
        scope: SlotScope,
        dir: &'static str,
        cardinality: Cardinality,
        dir_required: bool,
    ) -> Self {
        DocumentSlot {
            kind,
            scope,
            rule: PathRule::Glob { dir },
            cardinality,
            dir_required,
        }
    }
}

/// The full, ordered directory contract. Slot order is document discovery order.
#[derive(Debug, Clone)]
pub struct Contract {
    slots: Vec<DocumentSlot>,
}

impl Contract {
    /// The contract for the current workspace schema.
    pub fn v1() -> Self {
        use DocumentKind as K;
        use SlotScope::{Ecu, Root};

        Contract {
            slots: vec![
                DocumentSlot::file(K::SystemMetadata, Root, SYSTEM_METADATA),
                DocumentSlot::file(K::EcuMetadata, Ecu, "ecu_metadata.flync.yaml"),
                DocumentSlot::file(K::EcuPorts, Ecu, "ports.flync.yaml"),
                DocumentSlot::file(K::EcuTopology, Ecu, "topology.flync.yaml"),
                DocumentSlot::glob(K::Controller, Ecu, "controllers", Cardinality::OneOrMore, true),
                DocumentSlot::glob(K::Switch, Ecu, "switches", Cardinality::ZeroOrMore, false),
                DocumentSlot::glob(
                    K::ServiceInterface,
                    Root,
                    SERVICES_DIR,
                    Cardinality::ZeroOrMore,
                    false,
                ),
            ],
        }
    }

    /// Slots relative to the workspace root, in order.
    pub fn root_slots(&self) -> impl Iterator<Item = &DocumentSlot> {
        self.slots.iter().filter(|s| s.scope == SlotScope::Root)
    }

    /// Slots relative to each ECU directory, in order.
    pub fn ecu_slots(&self) -> impl Iterator<Item = &DocumentSlot> {
        self.slots.iter().filter(|s| s.scope == SlotScope::Ecu)
    }

    /// File names a slot reserves inside an ECU directory.
    pub fn ecu_file_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ecu_slots().filter_map(|s| match s.rule {
            PathRule::File(name) => Some(name),
            PathRule::Glob { .. } => None,
        })
    }
}

impl Default for Contract {
    fn default() -> Self {
        Contract::v1()
    }
}

/// Whether a file name carries the document suffix.
pub fn is_document_name(name: &str) -> bool {
    name.ends_with(DOCUMENT_EXTENSION) && name.len() > DOCUMENT_EXTENSION.len()
}

/// Whether a file looks like a YAML document that lost its proper suffix
/// (`ports.yaml`, `portsyaml`, `ports.yml`).
pub fn is_misnamed_document(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !is_document_name(name) && (lower.ends_with("yaml") || lower.ends_with("yml"))
}
