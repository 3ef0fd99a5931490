//! Internal topology of an ECU: which ports, switch ports and controller interfaces are wired.

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{BuildErrors, FromNode, MapReader};
use crate::core::entity::EntityKind;
use crate::core::location::FieldPath;

/// One wire inside an ECU. Endpoints are names resolved after every document is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Connection {
    EcuPortToSwitchPort {
        id: String,
        ecu_port: String,
        switch_port: String,
    },
    SwitchPortToControllerInterface {
        id: String,
        switch_port: String,
        controller_interface: String,
    },
    SwitchToSwitchSameEcu {
        id: String,
        switch_port: String,
        switch2_port: String,
    },
}

impl Connection {
    pub fn id(&self) -> &str {
        match self {
            Connection::EcuPortToSwitchPort { id, .. }
            | Connection::SwitchPortToControllerInterface { id, .. }
            | Connection::SwitchToSwitchSameEcu { id, .. } => id,
        }
    }

    /// The named endpoints: field, target kind, target name.
    pub fn endpoints(&self) -> Vec<(&'static str, EntityKind, &str)> {
        match self {
            Connection::EcuPortToSwitchPort {
                ecu_port,
                switch_port,
                ..
            } => vec![
                ("ecu_port", EntityKind::EcuPort, ecu_port),
                ("switch_port", EntityKind::SwitchPort, switch_port),
            ],
            Connection::SwitchPortToControllerInterface {
                switch_port,
                controller_interface,
                ..
            } => vec![
                ("switch_port", EntityKind::SwitchPort, switch_port),
                (
                    "controller_interface",
                    EntityKind::ControllerInterface,
                    controller_interface,
                ),
            ],
            Connection::SwitchToSwitchSameEcu {
                switch_port,
                switch2_port,
                ..
            } => vec![
                ("switch_port", EntityKind::SwitchPort, switch_port),
                ("switch2_port", EntityKind::SwitchPort, switch2_port),
            ],
        }
    }
}

fn ecu_port_to_switch_port(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Connection> {
    let mut map = MapReader::open(node, path, errs)?;
    let id = map.required::<String>("id", errs);
    let ecu_port = map.required::<String>("ecu_port", errs);
    let switch_port = map.required::<String>("switch_port", errs);
    map.finish(errs)?;
    Some(Connection::EcuPortToSwitchPort {
        id: id?,
        ecu_port: ecu_port?,
        switch_port: switch_port?,
    })
}

fn switch_port_to_controller_interface(
    node: &Value,
    path: &FieldPath,
    errs: &mut BuildErrors,
) -> Option<Connection> {
    let mut map = MapReader::open(node, path, errs)?;
    let id = map.required::<String>("id", errs);
    let switch_port = map.required::<String>("switch_port", errs);
    let controller_interface = map.required::<String>("controller_interface", errs);
    map.finish(errs)?;
    Some(Connection::SwitchPortToControllerInterface {
        id: id?,
        switch_port: switch_port?,
        controller_interface: controller_interface?,
    })
}

fn switch_to_switch_same_ecu(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Connection> {
    let mut map = MapReader::open(node, path, errs)?;
    let id = map.required::<String>("id", errs);
    let switch_port = map.required::<String>("switch_port", errs);
    let switch2_port = map.required::<String>("switch2_port", errs);
    map.finish(errs)?;
    Some(Connection::SwitchToSwitchSameEcu {
        id: id?,
        switch_port: switch_port?,
        switch2_port: switch2_port?,
    })
}

pub const CONNECTION: Discriminator<Connection> = Discriminator {
    subject: "topology connection",
    tag_field: "type",
    variants: &[
        Variant {
            tag: "ecu_port_to_switch_port",
            build: ecu_port_to_switch_port,
        },
        Variant {
            tag: "switch_port_to_controller_interface",
            build: switch_port_to_controller_interface,
        },
        Variant {
            tag: "switch_to_switch_same_ecu",
            build: switch_to_switch_same_ecu,
        },
    ],
};

impl FromNode for Connection {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        CONNECTION.resolve(node, path, errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::diagnostic::DiagnosticKind;

    fn connections(text: &str) -> (Option<Vec<Connection>>, BuildErrors) {
        let mut errs = BuildErrors::new("topology.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let list = Vec::<Connection>::from_node(&node, &FieldPath::root().key("connections"), &mut errs);
        (list, errs)
    }

    #[test]
    fn test_connection_variants_by_shape() {
        let (list, errs) = connections(
            "- {id: '1', ecu_port: a, switch_port: b}\n\
             - {type: switch_port_to_controller_interface, id: '2', switch_port: a, controller_interface: c}\n\
             - {id: '3', switch_port: a, switch2_port: d}\n",
        );
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let list = list.unwrap();
        assert!(matches!(list[0], Connection::EcuPortToSwitchPort { .. }));
        assert!(matches!(list[1], Connection::SwitchPortToControllerInterface { .. }));
        assert!(matches!(list[2], Connection::SwitchToSwitchSameEcu { .. }));
        assert_eq!(list[2].id(), "3");
        assert_eq!(list[2].endpoints()[1], ("switch2_port", EntityKind::SwitchPort, "d"));
    }

    #[test]
    fn test_switch_to_switch_missing_second_port() {
        let (list, errs) = connections("- {type: switch_to_switch_same_ecu, id: '1', switch_port: a}\n");
        assert!(list.is_none());
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::NoVariantMatched);
        assert_eq!(diag.location.field.to_string(), "connections.0");
        assert_eq!(diag.context.len(), 3);
        assert!(diag.context[2].1.contains("connections.0.switch2_port: Field required"));
    }
}
