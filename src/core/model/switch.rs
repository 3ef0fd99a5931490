//! Ethernet switches inside an ECU.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::core::model::controller::ControllerInterface;
use crate::core::model::datatypes::GroupAddress;
use crate::core::model::filter::FrameFilter;
use crate::core::model::metadata::EmbeddedMetadata;
use crate::core::model::port::MiiConfig;
use crate::core::model::security::MacsecConfig;
use crate::core::model::timesync::PtpConfig;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchPort {
    pub name: String,
    pub silicon_port_no: u16,
    pub default_vlan_id: u16,
    pub mii_config: Option<MiiConfig>,
    pub ptp_config: Option<PtpConfig>,
    pub macsec_config: Option<MacsecConfig>,
}

impl FromNode for SwitchPort {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let silicon_port_no = map.required::<u16>("silicon_port_no", errs);
        let default_vlan_id = map.required_in("default_vlan_id", 0..=4095u16, errs);
        let mii_config = map.optional::<MiiConfig>("mii_config", errs);
        let ptp_config = map.optional::<PtpConfig>("ptp_config", errs);
        let macsec_config = map.optional::<MacsecConfig>("macsec_config", errs);
        map.finish(errs)?;
        Some(SwitchPort {
            name: name?,
            silicon_port_no: silicon_port_no?,
            default_vlan_id: default_vlan_id?,
            mii_config,
            ptp_config,
            macsec_config,
        })
    }
}

/// Ports a multicast group is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MulticastGroup {
    pub address: GroupAddress,
    pub ports: Vec<String>,
}

impl FromNode for MulticastGroup {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let address = map.required::<GroupAddress>("address", errs);
        let ports = map.required::<Vec<String>>("ports", errs);
        map.finish(errs)?;
        Some(MulticastGroup {
            address: address?,
            ports: ports?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vlan {
    pub name: String,
    pub id: u16,
    pub default_priority: u8,
    /// Names of member ports of the same switch
    pub ports: Vec<String>,
    pub multicast: Vec<MulticastGroup>,
}

impl FromNode for Vlan {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let id = map.required_in("id", 0..=4095u16, errs);
        let default_priority = map.required_in("default_priority", 0..=7u8, errs);
        let ports = map.required::<Vec<String>>("ports", errs);
        let multicast = map.optional::<Vec<MulticastGroup>>("multicast", errs);
        map.finish(errs)?;
        Some(Vlan {
            name: name?,
            id: id?,
            default_priority: default_priority?,
            ports: ports?,
            multicast: multicast.unwrap_or_default(),
        })
    }
}

/// What a TCAM rule does with a matching frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TcamAction {
    Drop { ports: Vec<String> },
    Mirror { ports: Vec<String> },
    VlanOverwrite { ports: Vec<String> },
}

impl TcamAction {
    pub fn ports(&self) -> &[String] {
        match self {
            TcamAction::Drop { ports } | TcamAction::Mirror { ports } | TcamAction::VlanOverwrite { ports } => ports,
        }
    }
}

fn action_ports(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Vec<String>> {
    let mut map = MapReader::open(node, path, errs)?;
    let ports = map.required::<Vec<String>>("ports", errs);
    map.finish(errs)?;
    ports
}

fn drop_action(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<TcamAction> {
    action_ports(node, path, errs).map(|ports| TcamAction::Drop { ports })
}

fn mirror_action(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<TcamAction> {
    action_ports(node, path, errs).map(|ports| TcamAction::Mirror { ports })
}

fn vlan_overwrite_action(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<TcamAction> {
    action_ports(node, path, errs).map(|ports| TcamAction::VlanOverwrite { ports })
}

pub const TCAM_ACTION: Discriminator<TcamAction> = Discriminator {
    subject: "TCAM action",
    tag_field: "type",
    variants: &[
        Variant { tag: "drop", build: drop_action },
        Variant { tag: "mirror", build: mirror_action },
        Variant {
            tag: "vlan_overwrite",
            build: vlan_overwrite_action,
        },
    ],
};

impl FromNode for TcamAction {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        TCAM_ACTION.resolve(node, path, errs)
    }
}

/// A hardware classification rule of the switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcamRule {
    pub name: String,
    pub id: u16,
    pub match_filter: FrameFilter,
    /// Ingress ports the rule applies to
    pub match_ports: Vec<String>,
    pub action: Vec<TcamAction>,
}

impl FromNode for TcamRule {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let id = map.required::<u16>("id", errs);
        let match_filter = map.required::<FrameFilter>("match_filter", errs);
        let match_ports = map.required::<Vec<String>>("match_ports", errs);
        let action = map.required::<Vec<TcamAction>>("action", errs);
        map.finish(errs)?;
        Some(TcamRule {
            name: name?,
            id: id?,
            match_filter: match_filter?,
            match_ports: match_ports?,
            action: action?,
        })
    }
}

/// Contents of a `switches/*.flync.yaml` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Switch {
    pub meta: Option<EmbeddedMetadata>,
    pub name: String,
    pub ports: Vec<SwitchPort>,
    pub vlans: Vec<Vlan>,
    pub host_controller: Option<ControllerInterface>,
    pub tcam_rules: Vec<TcamRule>,
}

impl FromNode for Switch {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let meta = map.optional::<EmbeddedMetadata>("meta", errs);
        let name = map.required::<String>("name", errs);
        let ports = map.required::<Vec<SwitchPort>>("ports", errs);
        let vlans = map.optional::<Vec<Vlan>>("vlans", errs);
        let host_controller = map.optional::<ControllerInterface>("host_controller", errs);
        let tcam_rules = map.optional::<Vec<TcamRule>>("tcam_rules", errs);
        map.finish(errs)?;

        let (ports, vlans) = (ports?, vlans.unwrap_or_default());
        let tcam_rules = tcam_rules.unwrap_or_default();
        let before = errs.error_count();

        let numbers: Vec<u16> = ports.iter().map(|p| p.silicon_port_no).collect();
        report_duplicates(&numbers, &path.key("ports"), "silicon_port_no", "Switch Ports (silicon_port_number)", errs);
        let ids: Vec<u16> = vlans.iter().map(|v| v.id).collect();
        report_duplicates(&ids, &path.key("vlans"), "id", "VLANs (id)", errs);
        let rule_names: Vec<&str> = tcam_rules.iter().map(|r| r.name.as_str()).collect();
        report_duplicates(&rule_names, &path.key("tcam_rules"), "name", "tcam_rules (name)", errs);
        let rule_ids: Vec<u16> = tcam_rules.iter().map(|r| r.id).collect();
        report_duplicates(&rule_ids, &path.key("tcam_rules"), "id", "tcam_rules (id)", errs);

        let local = |member: &String, at: FieldPath, what: &str, errs: &mut BuildErrors| {
            if !ports.iter().any(|p| &p.name == member) {
                errs.report(
                    &at,
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!("{} `{}` is not a port of this switch", what, member),
                    ),
                );
            }
        };
        for (i, vlan) in vlans.iter().enumerate() {
            let vlan_path = path.key("vlans").index(i);
            for (j, member) in vlan.ports.iter().enumerate() {
                local(member, vlan_path.key("ports").index(j), "VLAN member", errs);
            }
            for (g, group) in vlan.multicast.iter().enumerate() {
                for (j, member) in group.ports.iter().enumerate() {
                    local(member, vlan_path.key("multicast").index(g).key("ports").index(j), "multicast member", errs);
                }
            }
        }
        for (i, rule) in tcam_rules.iter().enumerate() {
            let rule_path = path.key("tcam_rules").index(i);
            for (j, member) in rule.match_ports.iter().enumerate() {
                local(member, rule_path.key("match_ports").index(j), "TCAM match port", errs);
            }
            for (a, action) in rule.action.iter().enumerate() {
                for (j, member) in action.ports().iter().enumerate() {
                    local(member, rule_path.key("action").index(a).key("ports").index(j), "TCAM action port", errs);
                }
            }
        }
        (errs.error_count() == before).then_some(())?;

        Some(Switch {
            meta,
            name: name?,
            ports,
            vlans,
            host_controller,
            tcam_rules,
        })
    }
}

/// Report every repeat of a value after its first occurrence.
fn report_duplicates<T>(values: &[T], list: &FieldPath, field: &str, what: &str, errs: &mut BuildErrors)
where
    T: Eq + Hash + Display,
{
    let mut first: HashMap<&T, usize> = HashMap::new();
    for (i, value) in values.iter().enumerate() {
        if let Some(&earlier) = first.get(value) {
            errs.report(
                &list.index(i).key(field),
                Diagnostic::error(
                    DiagnosticKind::InvariantViolation,
                    format!("Duplicates found in {}: {}", what, value),
                )
                .with_context("first declared at", list.index(earlier).to_string()),
            );
        } else {
            first.insert(value, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWITCH: &str = "\
name: eth_switch
ports:
  - {name: sw_port1, silicon_port_no: 1, default_vlan_id: 10}
  - {name: sw_port2, silicon_port_no: 2, default_vlan_id: 10}
vlans:
  - {name: vlan10, id: 10, default_priority: 0, ports: [sw_port1, sw_port2]}
";

    fn switch(text: &str) -> (Option<Switch>, BuildErrors) {
        let mut errs = BuildErrors::new("switches/sw.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let s = Switch::from_node(&node, &FieldPath::root(), &mut errs);
        (s, errs)
    }

    #[test]
    fn test_switch() {
        let (s, errs) = switch(SWITCH);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        assert_eq!(s.unwrap().ports.len(), 2);
    }

    #[test]
    fn test_unique_silicon_port_number() {
        let (s, errs) = switch(&SWITCH.replace("silicon_port_no: 2", "silicon_port_no: 1"));
        assert!(s.is_none());
        let diag = &errs.diagnostics()[0];
        assert!(diag.message.contains("Duplicates found in Switch Ports (silicon_port_number)"));
        assert_eq!(diag.location.field.to_string(), "ports.1.silicon_port_no");
    }

    #[test]
    fn test_vlan_member_must_be_local_port() {
        let (s, errs) = switch(&SWITCH.replace("[sw_port1, sw_port2]", "[sw_port1, sw_port9]"));
        assert!(s.is_none());
        assert_eq!(
            errs.diagnostics()[0].location.field.to_string(),
            "vlans.0.ports.1"
        );
    }

    const TCAM: &str = "\
tcam_rules:
  - name: tcam_rule_1
    id: 1
    match_filter: {vlanid: 10, src_ipv4: 10.10.5.5, src_port: 40, dst_port: {from_value: 4, to_value: 10}}
    match_ports: [sw_port1]
    action:
      - {type: mirror, ports: [sw_port2]}
      - {type: vlan_overwrite, ports: [sw_port2]}
  - name: tcam_rule_2
    id: 2
    match_filter: {vlanid: 10}
    match_ports: [sw_port1]
    action:
      - {type: drop, ports: [sw_port1]}
";

    fn messages(errs: &BuildErrors) -> Vec<String> {
        errs.diagnostics()
            .iter()
            .map(|d| format!("{}: {}", d.location.field, d.message))
            .collect()
    }

    #[test]
    fn test_tcam_rules() {
        let (s, errs) = switch(&format!("{}{}", SWITCH, TCAM));
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let s = s.unwrap();
        assert_eq!(s.tcam_rules.len(), 2);
        assert!(matches!(&s.tcam_rules[0].action[1], TcamAction::VlanOverwrite { ports } if ports == &["sw_port2"]));
    }

    #[test]
    fn test_tcam_ports_must_exist_on_switch() {
        let text = format!("{}{}", SWITCH, TCAM)
            .replace("match_ports: [sw_port1]\n    action:\n      - {type: mirror", "match_ports: [wrong_name]\n    action:\n      - {type: mirror")
            .replace("{type: drop, ports: [sw_port1]}", "{type: drop, ports: [wrong_name]}");
        let (s, errs) = switch(&text);
        assert!(s.is_none());
        assert_eq!(
            messages(&errs),
            vec![
                "tcam_rules.0.match_ports.0: TCAM match port `wrong_name` is not a port of this switch",
                "tcam_rules.1.action.0.ports.0: TCAM action port `wrong_name` is not a port of this switch",
            ]
        );
    }

    #[test]
    fn test_tcam_duplicate_name_and_id() {
        let text = format!("{}{}", SWITCH, TCAM).replace("name: tcam_rule_2\n    id: 2", "name: tcam_rule_1\n    id: 1");
        let (s, errs) = switch(&text);
        assert!(s.is_none());
        assert_eq!(
            messages(&errs),
            vec![
                "tcam_rules.1.name: Duplicates found in tcam_rules (name): tcam_rule_1",
                "tcam_rules.1.id: Duplicates found in tcam_rules (id): 1",
            ]
        );
    }

    #[test]
    fn test_tcam_unknown_action() {
        let (s, errs) = switch(&format!("{}{}", SWITCH, TCAM).replace("type: drop", "type: reroute"));
        assert!(s.is_none());
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::LiteralError);
        assert_eq!(errs.diagnostics()[0].location.field.to_string(), "tcam_rules.1.action.0.type");
    }

    #[test]
    fn test_vlan_multicast_groups() {
        let text = SWITCH.replace(
            "ports: [sw_port1, sw_port2]}",
            "ports: [sw_port1, sw_port2], multicast: [{address: 224.0.0.1, ports: [sw_port1]}, \
             {address: \"01:00:5E:00:00:00\", ports: [sw_port1, sw_port2]}]}",
        );
        let (s, errs) = switch(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let groups = &s.unwrap().vlans[0].multicast;
        assert!(matches!(groups[1].address, GroupAddress::Mac(_)));

        let (_, errs) = switch(&text.replace("224.0.0.1", "10.0.0.1"));
        assert_eq!(messages(&errs), vec!["vlans.0.multicast.0.address: 10.0.0.1 is not a multicast address"]);

        let (_, errs) = switch(&text.replace("ports: [sw_port1]}", "ports: [sw_port7]}"));
        assert_eq!(
            messages(&errs),
            vec!["vlans.0.multicast.0.ports.0: multicast member `sw_port7` is not a port of this switch"]
        );
    }

    #[test]
    fn test_port_ptp_and_switch_meta() {
        let text = format!(
            "meta:\n  author: Tier1\n  compatible_flync_version: {{version_schema: semver, version: '0.9.0'}}\n{}",
            SWITCH.replace(
                "{name: sw_port2, silicon_port_no: 2, default_vlan_id: 10}",
                "{name: sw_port2, silicon_port_no: 2, default_vlan_id: 10, ptp_config: {cmlds_linkport_enabled: true, \
                 ptp_ports: [{domain_id: 0, src_port_identity: 1, \
                 sync_config: {type: time_receiver, sync_timeout: 3, sync_followup_timeout: 10}, \
                 pdelay_config: {log_tx_period: 0}}]}}",
            )
        );
        let (s, errs) = switch(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let s = s.unwrap();
        assert_eq!(s.meta.unwrap().author, "Tier1");
        assert!(s.ports[1].ptp_config.as_ref().unwrap().cmlds_linkport_enabled);
        assert!(s.ports[0].ptp_config.is_none());
    }

    #[test]
    fn test_host_controller() {
        let text = format!(
            "{}host_controller:\n  name: sw_host\n  mac_address: \"02:00:00:00:00:01\"\n  \
             virtual_interfaces:\n    - {{name: v, vlanid: 10, addresses: []}}\n",
            SWITCH
        );
        let (s, errs) = switch(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        assert_eq!(s.unwrap().host_controller.unwrap().name, "sw_host");
    }
}
