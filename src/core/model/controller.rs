//! Controllers, their interfaces, virtual interfaces and sockets.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{literal, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::core::model::datatypes::{netmask_prefix, MacAddress, MulticastAddress};
use crate::core::model::metadata::EmbeddedMetadata;
use crate::core::model::port::MiiConfig;
use crate::core::model::security::{Firewall, MacsecConfig};
use crate::core::model::timesync::PtpConfig;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

/// An address assigned to a virtual interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IpEndpoint {
    V4 { address: Ipv4Addr, ipv4netmask: Ipv4Addr },
    V6 { address: Ipv6Addr, ipv6prefix: u8 },
}

impl IpEndpoint {
    pub fn address(&self) -> IpAddr {
        match self {
            IpEndpoint::V4 { address, .. } => IpAddr::V4(*address),
            IpEndpoint::V6 { address, .. } => IpAddr::V6(*address),
        }
    }
}

fn unicast_address(ip: IpAddr, path: &FieldPath, errs: &mut BuildErrors) -> Option<()> {
    if ip.is_multicast() || ip.is_unspecified() {
        errs.report(
            path,
            Diagnostic::error(
                DiagnosticKind::ValueError,
                format!("{} is not a unicast host address", ip),
            ),
        );
        return None;
    }
    Some(())
}

fn ipv4_endpoint(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<IpEndpoint> {
    let mut map = MapReader::open(node, path, errs)?;
    let address = map.required::<Ipv4Addr>("address", errs);
    let netmask = map.required_with("ipv4netmask", errs, |node, path, errs| {
        let mask = Ipv4Addr::from_node(node, path, errs)?;
        if netmask_prefix(mask).is_none() {
            errs.report(
                path,
                Diagnostic::error(
                    DiagnosticKind::ValueError,
                    format!("{} is not a contiguous netmask", mask),
                ),
            );
            return None;
        }
        Some(mask)
    });
    map.finish(errs)?;
    let address = address?;
    unicast_address(IpAddr::V4(address), &path.key("address"), errs)?;
    Some(IpEndpoint::V4 {
        address,
        ipv4netmask: netmask?,
    })
}

fn ipv6_endpoint(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<IpEndpoint> {
    let mut map = MapReader::open(node, path, errs)?;
    let address = map.required::<Ipv6Addr>("address", errs);
    let prefix = map.required_in("ipv6prefix", 0..=128u8, errs);
    map.finish(errs)?;
    let address = address?;
    unicast_address(IpAddr::V6(address), &path.key("address"), errs)?;
    Some(IpEndpoint::V6 {
        address,
        ipv6prefix: prefix?,
    })
}

pub const IP_ENDPOINT: Discriminator<IpEndpoint> = Discriminator {
    subject: "IP address entry",
    tag_field: "type",
    variants: &[
        Variant { tag: "ipv4", build: ipv4_endpoint },
        Variant { tag: "ipv6", build: ipv6_endpoint },
    ],
};

impl FromNode for IpEndpoint {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        IP_ENDPOINT.resolve(node, path, errs)
    }
}

/// A SOME/IP service instance offered or used on a socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Deployment {
    SomeipProvider {
        /// Service interface id
        service: u16,
        instance_id: u16,
        /// Named service discovery timing profile
        #[serde(skip_serializing_if = "Option::is_none")]
        someip_sd_timings_profile: Option<String>,
    },
    SomeipConsumer {
        service: u16,
        instance_id: u16,
        consumed_eventgroups: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        someip_sd_timings_profile: Option<String>,
    },
}

impl Deployment {
    pub fn service(&self) -> u16 {
        match self {
            Deployment::SomeipProvider { service, .. } | Deployment::SomeipConsumer { service, .. } => {
                *service
            }
        }
    }

    /// Eventgroup names the deployment expects its service to declare.
    pub fn consumed_eventgroups(&self) -> &[String] {
        match self {
            Deployment::SomeipProvider { .. } => &[],
            Deployment::SomeipConsumer {
                consumed_eventgroups,
                ..
            } => consumed_eventgroups,
        }
    }
}

fn someip_provider(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Deployment> {
    let mut map = MapReader::open(node, path, errs)?;
    let service = map.required::<u16>("service", errs);
    let instance_id = map.required::<u16>("instance_id", errs);
    let profile = map.optional::<String>("someip_sd_timings_profile", errs);
    map.finish(errs)?;
    Some(Deployment::SomeipProvider {
        service: service?,
        instance_id: instance_id?,
        someip_sd_timings_profile: profile,
    })
}

fn someip_consumer(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Deployment> {
    let mut map = MapReader::open(node, path, errs)?;
    let service = map.required::<u16>("service", errs);
    let instance_id = map.required::<u16>("instance_id", errs);
    let eventgroups = map.optional::<Vec<String>>("consumed_eventgroups", errs);
    let profile = map.optional::<String>("someip_sd_timings_profile", errs);
    map.finish(errs)?;
    Some(Deployment::SomeipConsumer {
        service: service?,
        instance_id: instance_id?,
        consumed_eventgroups: eventgroups.unwrap_or_default(),
        someip_sd_timings_profile: profile,
    })
}

pub const DEPLOYMENT: Discriminator<Deployment> = Discriminator {
    subject: "service deployment",
    tag_field: "type",
    variants: &[
        Variant {
            tag: "someip_provider",
            build: someip_provider,
        },
        Variant {
            tag: "someip_consumer",
            build: someip_consumer,
        },
    ],
};

impl FromNode for Deployment {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        DEPLOYMENT.resolve(node, path, errs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl FromNode for Protocol {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        literal(node, path, errs, &[("udp", Protocol::Udp), ("tcp", Protocol::Tcp)])
    }
}

/// A transport endpoint bound to one address of a virtual interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Socket {
    pub name: String,
    pub endpoint_address: IpAddr,
    pub port_no: u16,
    pub protocol: Protocol,
    pub deployments: Vec<Deployment>,
}

impl FromNode for Socket {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let endpoint_address = map.required::<IpAddr>("endpoint_address", errs);
        let port_no = map.required::<u16>("port_no", errs);
        let protocol = map.required::<Protocol>("protocol", errs);
        let deployments = map.optional::<Vec<Deployment>>("deployments", errs);
        map.finish(errs)?;
        Some(Socket {
            name: name?,
            endpoint_address: endpoint_address?,
            port_no: port_no?,
            protocol: protocol?,
            deployments: deployments.unwrap_or_default(),
        })
    }
}

/// A VLAN-tagged logical interface on a controller interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualInterface {
    pub name: String,
    pub vlanid: u16,
    pub addresses: Vec<IpEndpoint>,
    pub multicast: Vec<MulticastAddress>,
    pub sockets: Vec<Socket>,
}

impl FromNode for VirtualInterface {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let vlanid = map.required_in("vlanid", 0..=4095u16, errs);
        let addresses = map.required::<Vec<IpEndpoint>>("addresses", errs);
        let multicast = map.optional::<Vec<MulticastAddress>>("multicast", errs);
        let sockets = map.optional::<Vec<Socket>>("sockets", errs);
        map.finish(errs)?;

        let (addresses, sockets) = (addresses?, sockets.unwrap_or_default());
        let mut valid = true;
        for (i, socket) in sockets.iter().enumerate() {
            if !addresses.iter().any(|a| a.address() == socket.endpoint_address) {
                errs.report(
                    &path.key("sockets").index(i).key("endpoint_address"),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!(
                            "socket endpoint {} is not an address of this virtual interface",
                            socket.endpoint_address
                        ),
                    )
                    .with_context("socket", socket.name.clone()),
                );
                valid = false;
            }
        }
        valid.then_some(())?;

        Some(VirtualInterface {
            name: name?,
            vlanid: vlanid?,
            addresses,
            multicast: multicast.unwrap_or_default(),
            sockets,
        })
    }
}

/// One MAC of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerInterface {
    pub name: String,
    pub mac_address: MacAddress,
    pub mii_config: Option<MiiConfig>,
    pub virtual_interfaces: Vec<VirtualInterface>,
    pub ptp_config: Option<PtpConfig>,
    pub macsec_config: Option<MacsecConfig>,
    pub firewall: Option<Firewall>,
}

impl ControllerInterface {
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.virtual_interfaces.iter().flat_map(|v| v.sockets.iter())
    }
}

impl FromNode for ControllerInterface {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let mac_address = map.required_with("mac_address", errs, |node, path, errs| {
            let mac = MacAddress::from_node(node, path, errs)?;
            if !mac.is_unicast() {
                errs.report(
                    path,
                    Diagnostic::error(
                        DiagnosticKind::ValueError,
                        format!("{} is not a unicast MAC address", mac),
                    ),
                );
                return None;
            }
            Some(mac)
        });
        let mii_config = map.optional::<MiiConfig>("mii_config", errs);
        let vifaces_path = map.field("virtual_interfaces");
        let virtual_interfaces = map.required::<Vec<VirtualInterface>>("virtual_interfaces", errs);
        let ptp_config = map.optional::<PtpConfig>("ptp_config", errs);
        let macsec_config = map.optional::<MacsecConfig>("macsec_config", errs);
        let firewall = map.optional::<Firewall>("firewall", errs);
        map.finish(errs)?;

        let virtual_interfaces = virtual_interfaces?;
        if virtual_interfaces.is_empty() {
            errs.error(
                DiagnosticKind::ValueError,
                &vifaces_path,
                "List should have at least 1 item after validation, not 0",
            );
            return None;
        }
        let mut vlans = HashSet::new();
        for (i, viface) in virtual_interfaces.iter().enumerate() {
            if !vlans.insert(viface.vlanid) {
                errs.report(
                    &vifaces_path.index(i).key("vlanid"),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!("vlanid {} is used by more than one virtual interface", viface.vlanid),
                    ),
                );
                return None;
            }
        }

        Some(ControllerInterface {
            name: name?,
            mac_address: mac_address?,
            mii_config,
            virtual_interfaces,
            ptp_config,
            macsec_config,
            firewall,
        })
    }
}

/// Contents of a `controllers/*.flync.yaml` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Controller {
    pub meta: Option<EmbeddedMetadata>,
    pub name: String,
    pub interfaces: Vec<ControllerInterface>,
}

impl FromNode for Controller {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let meta = map.optional::<EmbeddedMetadata>("meta", errs);
        let name = map.required::<String>("name", errs);
        let interfaces = map.required::<Vec<ControllerInterface>>("interfaces", errs);
        map.finish(errs)?;
        Some(Controller {
            meta,
            name: name?,
            interfaces: interfaces?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER: &str = "\
name: eth_ecu_controller1
interfaces:
  - name: eth_ecu_c1_iface1
    mac_address: \"00:11:22:33:44:55\"
    mii_config:
      mode: mac
    virtual_interfaces:
      - name: vlan10
        vlanid: 10
        addresses:
          - address: 10.0.0.100
            ipv4netmask: 255.255.255.0
          - address: \"2001:db8::100\"
            ipv6prefix: 64
        multicast:
          - 224.0.0.1
        sockets:
          - name: sock_ets
            endpoint_address: 10.0.0.100
            port_no: 30501
            protocol: udp
            deployments:
              - type: someip_provider
                service: 257
                instance_id: 1
";

    fn controller(text: &str) -> (Option<Controller>, BuildErrors) {
        let mut errs = BuildErrors::new("controllers/c1.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let c = Controller::from_node(&node, &FieldPath::root(), &mut errs);
        (c, errs)
    }

    fn fields(errs: &BuildErrors) -> Vec<String> {
        errs.diagnostics()
            .iter()
            .map(|d| d.location.field.to_string())
            .collect()
    }

    #[test]
    fn test_full_controller() {
        let (c, errs) = controller(CONTROLLER);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let c = c.unwrap();
        let iface = &c.interfaces[0];
        assert_eq!(iface.mac_address.to_string(), "00:11:22:33:44:55");
        assert!(matches!(iface.virtual_interfaces[0].addresses[1], IpEndpoint::V6 { ipv6prefix: 64, .. }));
        let socket = iface.sockets().next().unwrap();
        assert_eq!(socket.deployments[0].service(), 257);
    }

    #[test]
    fn test_socket_endpoint_must_be_interface_address() {
        let (c, errs) = controller(&CONTROLLER.replace("endpoint_address: 10.0.0.100", "endpoint_address: 10.0.0.7"));
        assert!(c.is_none());
        assert_eq!(
            fields(&errs),
            vec!["interfaces.0.virtual_interfaces.0.sockets.0.endpoint_address"]
        );
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::InvariantViolation);
    }

    #[test]
    fn test_mixed_up_ip_entries() {
        let (c, errs) = controller(&CONTROLLER.replace("ipv6prefix: 64", "ipv4netmask: 64"));
        assert!(c.is_none());
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::NoVariantMatched);
        assert_eq!(
            diag.location.field.to_string(),
            "interfaces.0.virtual_interfaces.0.addresses.1"
        );
    }

    #[test]
    fn test_multicast_list_rejects_unicast() {
        let (_, errs) = controller(&CONTROLLER.replace("- 224.0.0.1", "- 10.0.0.1"));
        assert_eq!(
            fields(&errs),
            vec!["interfaces.0.virtual_interfaces.0.multicast.0"]
        );
    }

    #[test]
    fn test_virtual_interfaces_required_and_non_empty() {
        let text = "name: c\ninterfaces:\n  - name: i\n    mac_address: \"00:11:22:33:44:55\"\n";
        let (_, errs) = controller(text);
        assert_eq!(fields(&errs), vec!["interfaces.0.virtual_interfaces"]);
        assert_eq!(errs.diagnostics()[0].message, "Field required");

        let (_, errs) = controller(&format!("{}    virtual_interfaces: []\n", text));
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::ValueError);
    }

    #[test]
    fn test_vlanid_range_and_multicast_mac() {
        let (_, errs) = controller(&CONTROLLER.replace("vlanid: 10", "vlanid: 4096"));
        assert_eq!(fields(&errs), vec!["interfaces.0.virtual_interfaces.0.vlanid"]);

        let (_, errs) = controller(&CONTROLLER.replace("00:11:22:33:44:55", "01:00:5e:00:00:01"));
        assert_eq!(fields(&errs), vec!["interfaces.0.mac_address"]);
    }

    #[test]
    fn test_consumer_deployment() {
        let text = CONTROLLER.replace(
            "type: someip_provider",
            "type: someip_consumer\n                consumed_eventgroups: [eg1]",
        );
        let (c, errs) = controller(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let c = c.unwrap();
        let deployment = &c.interfaces[0].sockets().next().unwrap().deployments[0];
        assert_eq!(deployment.consumed_eventgroups(), &["eg1".to_string()]);
    }

    #[test]
    fn test_interface_time_sync_and_security() {
        let text = format!(
            "{}    ptp_config:\n      ptp_ports:\n        - domain_id: 0\n          src_port_identity: 1\n          \
             sync_config: {{type: time_transmitter, log_tx_period: -3, two_step: true, tlv: null}}\n          \
             pdelay_config: {{log_tx_period: 0}}\n    firewall:\n      default_action: drop\n      input_rules:\n        \
             - {{name: allow_ets, action: accept, pattern: {{src_ipv4: 10.0.0.1, protocol: udp, dst_port: 30501}}}}\n",
            CONTROLLER
        );
        let (c, errs) = controller(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let iface = &c.unwrap().interfaces[0];
        assert_eq!(iface.ptp_config.as_ref().unwrap().ptp_ports[0].domain_id, 0);
        assert_eq!(iface.firewall.as_ref().unwrap().input_rules[0].name, "allow_ets");
        assert!(iface.macsec_config.is_none());

        let (c, errs) = controller(&text.replace("log_tx_period: -3", "log_tx_period: 125"));
        assert!(c.is_none());
        assert_eq!(fields(&errs), vec!["interfaces.0.ptp_config.ptp_ports.0.sync_config"]);
    }

    #[test]
    fn test_sd_timings_profile() {
        let text = CONTROLLER.replace(
            "instance_id: 1\n",
            "instance_id: 1\n                someip_sd_timings_profile: server_default\n",
        );
        let (c, errs) = controller(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let c = c.unwrap();
        let deployment = &c.interfaces[0].sockets().next().unwrap().deployments[0];
        assert!(matches!(
            deployment,
            Deployment::SomeipProvider { someip_sd_timings_profile: Some(p), .. } if p == "server_default"
        ));
    }

    #[test]
    fn test_untagged_deployment_is_ambiguous() {
        let text = CONTROLLER.replace("              - type: someip_provider\n                service", "              - service");
        let (c, errs) = controller(&text);
        assert!(c.is_none());
        assert_eq!(
            fields(&errs),
            vec!["interfaces.0.virtual_interfaces.0.sockets.0.deployments.0"]
        );
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::AmbiguousVariant);
        assert_eq!(
            diag.context,
            vec![(
                "matching shapes".to_string(),
                "someip_provider, someip_consumer".to_string()
            )]
        );
    }
}
