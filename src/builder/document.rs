//! Per-document build step.
//!
//! Turns one indexed document into its typed entities plus the references they hold.
//! Nothing here touches the name registry, so documents can be built in any order and
//! on any thread; the loader registers the results sequentially afterwards.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::builder::reader::{partial_list, BuildErrors, FromNode, MapReader};
use crate::core::contract::DocumentKind;
use crate::core::entity::{EntityKey, EntityKind};
use crate::core::location::{FieldPath, Location};
use crate::core::model::{
    Connection, Controller, ControllerInterface, Ecu, EcuConnection, EcuMetadata, EcuPort, Entity,
    EntityRecord, ServiceInterface, Switch, SystemMetadata,
};
use crate::core::reference::Reference;
use crate::sources::{read_document, DocumentParser, IndexEntry, RawNode};
use crate::util::diagnostic::Diagnostic;

/// Everything one document contributed.
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    /// Discovery order of the document
    pub order: usize,
    pub kind: DocumentKind,
    /// Path relative to the workspace root
    pub document: PathBuf,
    /// Set for the root metadata document when it built
    pub system: Option<SystemMetadata>,
    /// The `name` the root metadata document declares, even if the rest of it is broken
    pub declared_name: Option<String>,
    /// Entities in declaration order
    pub entities: Vec<EntityRecord>,
    pub references: Vec<Reference>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Read, parse and build one index entry.
///
/// Missing or unreadable documents yield no entities, except that an ECU exists as soon
/// as its directory does.
pub fn build_entry(entry: &IndexEntry, parser: &dyn DocumentParser) -> BuiltDocument {
    if !entry.is_present() {
        return build_document(entry, None);
    }
    match read_document(parser, &entry.absolute, &entry.relative) {
        Ok(raw) => build_document(entry, Some(&raw)),
        Err(err) => {
            debug!("{}", err);
            let mut built = build_document(entry, None);
            built.diagnostics.insert(0, err.to_diagnostic());
            built
        }
    }
}

/// Build an already parsed document. `raw` is `None` when there is nothing to parse.
pub fn build_document(entry: &IndexEntry, raw: Option<&RawNode>) -> BuiltDocument {
    let mut errs = BuildErrors::new(entry.relative.clone());
    let mut out = Extract::new(&entry.relative);
    let ecu = entry.ecu.as_deref().unwrap_or_default();
    let root = FieldPath::root();
    let mut system = None;
    let mut declared_name = None;

    match (entry.kind, raw.map(|r| &r.value)) {
        (DocumentKind::SystemMetadata, Some(node)) => {
            declared_name = node.get("name").and_then(Value::as_str).map(str::to_string);
            system = SystemMetadata::from_node(node, &root, &mut errs);
        }
        (DocumentKind::EcuMetadata, node) => {
            let metadata = node.and_then(|n| EcuMetadata::from_node(n, &root, &mut errs));
            out.entity(
                Entity::Ecu(Ecu {
                    name: ecu.to_string(),
                    metadata,
                }),
                root,
            );
        }
        (DocumentKind::EcuPorts, Some(node)) => {
            for (i, port) in top_level_list::<EcuPort>(node, "ports", &mut errs) {
                out.entity(Entity::EcuPort(port), root.key("ports").index(i));
            }
        }
        (DocumentKind::EcuTopology, Some(node)) => {
            for (i, connection) in top_level_list::<Connection>(node, "connections", &mut errs) {
                out.connection(ecu, connection, root.key("connections").index(i));
            }
        }
        (DocumentKind::Controller, Some(node)) => {
            if let Some(controller) = Controller::from_node(node, &root, &mut errs) {
                out.controller(controller);
            }
        }
        (DocumentKind::Switch, Some(node)) => {
            if let Some(switch) = Switch::from_node(node, &root, &mut errs) {
                out.switch(switch);
            }
        }
        (DocumentKind::ServiceInterface, Some(node)) => {
            if let Some(service) = ServiceInterface::from_node(node, &root, &mut errs) {
                out.entity(Entity::ServiceInterface(service), root);
            }
        }
        (_, None) => {}
    }

    debug!(
        "built {}: {} entities, {} references, {} diagnostics",
        entry.relative.display(),
        out.entities.len(),
        out.references.len(),
        errs.diagnostics().len()
    );

    BuiltDocument {
        order: entry.order,
        kind: entry.kind,
        document: entry.relative.clone(),
        system,
        declared_name,
        entities: out.entities,
        references: out.references,
        diagnostics: errs.into_diagnostics(),
    }
}

/// A document whose body is `{<key>: [...]}`. Items that fail are dropped, the rest kept.
fn top_level_list<T: FromNode>(node: &Value, key: &'static str, errs: &mut BuildErrors) -> Vec<(usize, T)> {
    let Some(mut map) = MapReader::open(node, &FieldPath::root(), errs) else {
        return Vec::new();
    };
    let items = map.required_with(key, errs, partial_list::<T>);
    // Unknown keys are reported; the valid items still count.
    let _ = map.finish(errs);
    items.unwrap_or_default()
}

/// Collects entities and references while walking a built document.
struct Extract<'a> {
    document: &'a Path,
    entities: Vec<EntityRecord>,
    references: Vec<Reference>,
}

impl<'a> Extract<'a> {
    fn new(document: &'a Path) -> Self {
        Extract {
            document,
            entities: Vec::new(),
            references: Vec::new(),
        }
    }

    fn location(&self, field: FieldPath) -> Location {
        Location::new(self.document, field)
    }

    fn entity(&mut self, entity: Entity, field: FieldPath) -> EntityKey {
        let record = EntityRecord::new(entity, self.location(field));
        let key = record.key.clone();
        self.entities.push(record);
        key
    }

    fn reference(&mut self, owner: &EntityKey, target: EntityKind, name: &str, field: FieldPath) {
        let location = self.location(field);
        self.references
            .push(Reference::by_name(owner.clone(), target, name, location));
    }

    fn connection(&mut self, ecu: &str, connection: Connection, field: FieldPath) {
        let endpoints: Vec<(&'static str, EntityKind, String)> = connection
            .endpoints()
            .into_iter()
            .map(|(name, kind, target)| (name, kind, target.to_string()))
            .collect();
        let owner = self.entity(
            Entity::Connection(EcuConnection {
                ecu: ecu.to_string(),
                connection,
            }),
            field.clone(),
        );
        for (name, kind, target) in endpoints {
            self.reference(&owner, kind, &target, field.key(name));
        }
    }

    fn controller(&mut self, controller: Controller) {
        let root = FieldPath::root();
        let interfaces = controller.interfaces.clone();
        self.entity(Entity::Controller(controller), root.clone());
        for (i, interface) in interfaces.into_iter().enumerate() {
            self.interface(interface, root.key("interfaces").index(i));
        }
    }

    /// A controller interface, its sockets and what those sockets deploy.
    fn interface(&mut self, interface: ControllerInterface, field: FieldPath) {
        let vifaces = interface.virtual_interfaces.clone();
        self.entity(Entity::ControllerInterface(interface), field.clone());

        for (v, viface) in vifaces.into_iter().enumerate() {
            let vpath = field.key("virtual_interfaces").index(v);
            for (s, socket) in viface.sockets.into_iter().enumerate() {
                let spath = vpath.key("sockets").index(s);
                let deployments = socket.deployments.clone();
                let owner = self.entity(Entity::Socket(socket), spath.clone());

                for (d, deployment) in deployments.iter().enumerate() {
                    let dpath = spath.key("deployments").index(d);
                    let reference = Reference::by_id(
                        owner.clone(),
                        EntityKind::ServiceInterface,
                        u64::from(deployment.service()),
                        self.location(dpath.key("service")),
                    )
                    .with_eventgroups(
                        deployment.consumed_eventgroups().to_vec(),
                        self.location(dpath.key("consumed_eventgroups")),
                    );
                    self.references.push(reference);
                }
            }
        }
    }

    fn switch(&mut self, switch: Switch) {
        let root = FieldPath::root();
        let ports = switch.ports.clone();
        let vlans = switch.vlans.clone();
        let host = switch.host_controller.clone();
        let owner = self.entity(Entity::Switch(switch), root.clone());

        for (i, port) in ports.into_iter().enumerate() {
            self.entity(Entity::SwitchPort(port), root.key("ports").index(i));
        }
        for (i, vlan) in vlans.iter().enumerate() {
            for (j, member) in vlan.ports.iter().enumerate() {
                self.reference(
                    &owner,
                    EntityKind::SwitchPort,
                    member,
                    root.key("vlans").index(i).key("ports").index(j),
                );
            }
        }
        if let Some(host) = host {
            self.interface(host, root.key("host_controller"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::RefKey;
    use crate::sources::{DocumentStatus, YamlParser};
    use crate::util::diagnostic::DiagnosticKind;

    fn entry(kind: DocumentKind, relative: &str) -> IndexEntry {
        IndexEntry {
            order: 0,
            kind,
            relative: PathBuf::from(relative),
            absolute: PathBuf::from("/nonexistent").join(relative),
            ecu: Some("eth_ecu".to_string()),
            status: DocumentStatus::Present,
        }
    }

    fn build(kind: DocumentKind, relative: &str, text: &str) -> BuiltDocument {
        let entry = entry(kind, relative);
        let raw = YamlParser.parse(text, &entry.relative).unwrap();
        build_document(&entry, Some(&raw))
    }

    #[test]
    fn test_topology_keeps_valid_connections() {
        let built = build(
            DocumentKind::EcuTopology,
            "ecus/eth_ecu/topology.flync.yaml",
            "connections:\n\
             - {id: '1', ecu_port: p1, switch_port: sw1}\n\
             - {id: '2', bogus: true}\n",
        );
        assert_eq!(built.entities.len(), 1);
        assert_eq!(built.entities[0].key.to_string(), "connection.eth_ecu/1");
        assert_eq!(built.references.len(), 2);
        assert_eq!(
            built.references[0].location.to_string(),
            "ecus/eth_ecu/topology.flync.yaml:connections.0.ecu_port"
        );
        assert_eq!(built.references[1].target, EntityKind::SwitchPort);
        assert!(built
            .diagnostics
            .iter()
            .all(|d| d.location.field.to_string().starts_with("connections.1")));
    }

    #[test]
    fn test_switch_extracts_ports_and_vlan_members() {
        let built = build(
            DocumentKind::Switch,
            "ecus/eth_ecu/switches/sw.flync.yaml",
            "name: sw\n\
             ports:\n  - {name: sw1, silicon_port_no: 1, default_vlan_id: 10}\n\
             vlans:\n  - {name: v10, id: 10, default_priority: 0, ports: [sw1]}\n",
        );
        assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);
        let keys: Vec<String> = built.entities.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["switch.sw", "switch_port.sw1"]);
        assert_eq!(built.references[0].key, RefKey::Name("sw1".to_string()));
        assert_eq!(built.references[0].location.field.to_string(), "vlans.0.ports.0");
    }

    #[test]
    fn test_consumer_deployment_carries_eventgroups() {
        let built = build(
            DocumentKind::Controller,
            "ecus/eth_ecu/controllers/c.flync.yaml",
            "name: c\n\
             interfaces:\n\
             - name: i\n  mac_address: \"02:00:00:00:00:01\"\n  virtual_interfaces:\n\
             \x20 - name: v\n    vlanid: 1\n    addresses: [{address: 10.0.0.1, ipv4netmask: 255.255.255.0}]\n\
             \x20   sockets:\n\
             \x20     - name: s\n        endpoint_address: 10.0.0.1\n        port_no: 30500\n        protocol: udp\n\
             \x20       deployments:\n\
             \x20         - {type: someip_consumer, service: 257, instance_id: 1, consumed_eventgroups: [eg]}\n",
        );
        assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);
        let keys: Vec<String> = built.entities.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["controller.c", "controller_interface.i", "socket.s"]);
        let reference = &built.references[0];
        assert_eq!(reference.key, RefKey::Id(257));
        assert_eq!(
            reference.location.field.to_string(),
            "interfaces.0.virtual_interfaces.0.sockets.0.deployments.0.service"
        );
        assert_eq!(reference.eventgroups.as_ref().unwrap().names, vec!["eg"]);
    }

    #[test]
    fn test_ecu_exists_without_metadata() {
        let mut missing = entry(DocumentKind::EcuMetadata, "ecus/eth_ecu/ecu_metadata.flync.yaml");
        missing.status = DocumentStatus::Missing;
        let built = build_entry(&missing, &YamlParser);
        assert_eq!(built.entities.len(), 1);
        assert_eq!(built.entities[0].key.to_string(), "ecu.eth_ecu");
        assert!(built.diagnostics.is_empty());
    }

    #[test]
    fn test_unreadable_document() {
        let built = build_entry(&entry(DocumentKind::EcuPorts, "ecus/eth_ecu/ports.flync.yaml"), &YamlParser);
        assert!(built.entities.is_empty());
        assert_eq!(built.diagnostics[0].kind, DiagnosticKind::ReadError);
    }
}
