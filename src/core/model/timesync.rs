//! gPTP (IEEE 802.1AS) time synchronization settings of a controller interface or switch port.

use std::collections::HashMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{describe, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

/// Allowed `logMessageInterval` for Sync messages, 2^-7 s to 2^3 s.
const SYNC_LOG_INTERVAL: std::ops::RangeInclusive<i8> = -7..=3;

/// Role of a port in one PTP domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncConfig {
    TimeTransmitter { log_tx_period: i8, two_step: bool },
    TimeReceiver { sync_timeout: u16, sync_followup_timeout: u16 },
}

fn time_transmitter(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<SyncConfig> {
    let mut map = MapReader::open(node, path, errs)?;
    let log_tx_period = map.required_in("log_tx_period", SYNC_LOG_INTERVAL, errs);
    let two_step = map.optional::<bool>("two_step", errs);
    // No Sync TLVs are modelled; only an explicit null is accepted.
    map.optional_with("tlv", errs, |node, path, errs| -> Option<()> {
        errs.report(
            path,
            Diagnostic::error(DiagnosticKind::ValueError, "Input should be None")
                .with_context("input", describe(node)),
        );
        None
    });
    map.finish(errs)?;
    Some(SyncConfig::TimeTransmitter {
        log_tx_period: log_tx_period?,
        two_step: two_step.unwrap_or(true),
    })
}

fn time_receiver(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<SyncConfig> {
    let mut map = MapReader::open(node, path, errs)?;
    let sync_timeout = map.required::<u16>("sync_timeout", errs);
    let sync_followup_timeout = map.required::<u16>("sync_followup_timeout", errs);
    map.finish(errs)?;
    Some(SyncConfig::TimeReceiver {
        sync_timeout: sync_timeout?,
        sync_followup_timeout: sync_followup_timeout?,
    })
}

pub const SYNC_CONFIG: Discriminator<SyncConfig> = Discriminator {
    subject: "sync configuration",
    tag_field: "type",
    variants: &[
        Variant {
            tag: "time_transmitter",
            build: time_transmitter,
        },
        Variant {
            tag: "time_receiver",
            build: time_receiver,
        },
    ],
};

impl FromNode for SyncConfig {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        SYNC_CONFIG.resolve(node, path, errs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PdelayConfig {
    pub log_tx_period: i8,
}

impl FromNode for PdelayConfig {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let log_tx_period = map.required::<i8>("log_tx_period", errs);
        map.finish(errs)?;
        Some(PdelayConfig {
            log_tx_period: log_tx_period?,
        })
    }
}

/// One PTP port instance, bound to a single domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PtpPort {
    pub domain_id: u8,
    pub src_port_identity: u16,
    pub sync_config: SyncConfig,
    pub pdelay_config: PdelayConfig,
}

impl FromNode for PtpPort {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let domain_id = map.required_in("domain_id", 0..=127u8, errs);
        let src_port_identity = map.required::<u16>("src_port_identity", errs);
        let sync_config = map.required::<SyncConfig>("sync_config", errs);
        let pdelay_config = map.required::<PdelayConfig>("pdelay_config", errs);
        map.finish(errs)?;
        Some(PtpPort {
            domain_id: domain_id?,
            src_port_identity: src_port_identity?,
            sync_config: sync_config?,
            pdelay_config: pdelay_config?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PtpConfig {
    /// Common mean link delay service on the link port
    pub cmlds_linkport_enabled: bool,
    pub ptp_ports: Vec<PtpPort>,
}

impl FromNode for PtpConfig {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let cmlds = map.optional::<bool>("cmlds_linkport_enabled", errs);
        let ports_path = map.field("ptp_ports");
        let ptp_ports = map.required::<Vec<PtpPort>>("ptp_ports", errs);
        map.finish(errs)?;

        let ptp_ports = ptp_ports?;
        let mut domains: HashMap<u8, usize> = HashMap::new();
        let mut valid = true;
        for (i, port) in ptp_ports.iter().enumerate() {
            if let Some(&first) = domains.get(&port.domain_id) {
                errs.report(
                    &ports_path.index(i).key("domain_id"),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!("PTP domain {} has more than one port instance", port.domain_id),
                    )
                    .with_context("first declared at", ports_path.index(first).to_string()),
                );
                valid = false;
            } else {
                domains.insert(port.domain_id, i);
            }
        }
        valid.then_some(())?;

        Some(PtpConfig {
            cmlds_linkport_enabled: cmlds.unwrap_or(false),
            ptp_ports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PTP: &str = "\
cmlds_linkport_enabled: false
ptp_ports:
  - domain_id: 0
    src_port_identity: 1
    sync_config: {type: time_transmitter, log_tx_period: -3, two_step: true, tlv: null}
    pdelay_config: {log_tx_period: 0}
  - domain_id: 1
    src_port_identity: 2
    sync_config: {type: time_receiver, sync_timeout: 3, sync_followup_timeout: 10}
    pdelay_config: {log_tx_period: 0}
";

    fn ptp(text: &str) -> (Option<PtpConfig>, BuildErrors) {
        let mut errs = BuildErrors::new("controllers/c1.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let p = PtpConfig::from_node(&node, &FieldPath::root(), &mut errs);
        (p, errs)
    }

    fn kinds(errs: &BuildErrors) -> Vec<(String, DiagnosticKind)> {
        errs.diagnostics()
            .iter()
            .map(|d| (d.location.field.to_string(), d.kind))
            .collect()
    }

    #[test]
    fn test_two_domains_with_different_roles() {
        let (p, errs) = ptp(PTP);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let p = p.unwrap();
        assert!(!p.cmlds_linkport_enabled);
        assert_eq!(
            p.ptp_ports[0].sync_config,
            SyncConfig::TimeTransmitter {
                log_tx_period: -3,
                two_step: true
            }
        );
        assert!(matches!(p.ptp_ports[1].sync_config, SyncConfig::TimeReceiver { .. }));
    }

    #[test]
    fn test_cmlds_defaults_to_disabled() {
        let (p, errs) = ptp(&PTP.replace("cmlds_linkport_enabled: false\n", ""));
        assert!(errs.diagnostics().is_empty());
        assert!(!p.unwrap().cmlds_linkport_enabled);
    }

    #[test]
    fn test_missing_domain_and_bad_identity() {
        let (p, errs) = ptp(&PTP.replace("  - domain_id: 0\n    src_port_identity: 1", "  - src_port_identity: wrong"));
        assert!(p.is_none());
        assert_eq!(
            kinds(&errs),
            vec![
                ("ptp_ports.0.domain_id".to_string(), DiagnosticKind::Missing),
                ("ptp_ports.0.src_port_identity".to_string(), DiagnosticKind::TypeError),
            ]
        );
    }

    #[test]
    fn test_sync_interval_out_of_range() {
        let (p, errs) = ptp(&PTP.replace("log_tx_period: -3", "log_tx_period: 125"));
        assert!(p.is_none());
        assert_eq!(errs.diagnostics().len(), 1);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::NoVariantMatched);
        assert_eq!(errs.diagnostics()[0].location.field.to_string(), "ptp_ports.0.sync_config");

        let (_, errs) = ptp(&PTP.replace("log_tx_period: -3, ", ""));
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::NoVariantMatched);
    }

    #[test]
    fn test_role_tag_must_match_fields() {
        let (p, errs) = ptp(&PTP.replace("type: time_transmitter", "type: time_receiver"));
        assert!(p.is_none());
        assert_eq!(
            kinds(&errs),
            vec![("ptp_ports.0.sync_config.type".to_string(), DiagnosticKind::VariantTagMismatch)]
        );

        let (_, errs) = ptp(&PTP.replace("type: time_receiver", "type: time_transmitter"));
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::VariantTagMismatch);
    }

    #[test]
    fn test_sync_config_required_and_pdelay_integer() {
        let (_, errs) = ptp(&PTP.replace(
            "    sync_config: {type: time_receiver, sync_timeout: 3, sync_followup_timeout: 10}\n",
            "",
        ));
        assert_eq!(
            kinds(&errs),
            vec![("ptp_ports.1.sync_config".to_string(), DiagnosticKind::Missing)]
        );

        let (_, errs) = ptp(&PTP.replacen("pdelay_config: {log_tx_period: 0}", "pdelay_config: {log_tx_period: 0.3}", 1));
        assert_eq!(
            kinds(&errs),
            vec![("ptp_ports.0.pdelay_config.log_tx_period".to_string(), DiagnosticKind::TypeError)]
        );
    }

    #[test]
    fn test_one_port_instance_per_domain() {
        let (p, errs) = ptp(&PTP.replace("domain_id: 1", "domain_id: 0"));
        assert!(p.is_none());
        assert_eq!(
            kinds(&errs),
            vec![("ptp_ports.1.domain_id".to_string(), DiagnosticKind::InvariantViolation)]
        );
    }
}
