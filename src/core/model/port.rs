//! ECU ports and their PHY configuration.

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{int_literal, literal, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

impl FromNode for Role {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        literal(node, path, errs, &[("master", Role::Master), ("slave", Role::Slave)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    Half,
    Full,
}

/// 10BASE-T1S physical layer collision avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plca {
    pub node_id: u8,
    pub node_count: Option<u8>,
}

impl FromNode for Plca {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let node_id = map.required_in("node_id", 0..=254u8, errs);
        let node_count = map.optional_in("node_count", 1..=255u8, errs);
        map.finish(errs)?;

        let (node_id, node_count) = (node_id?, node_count);
        match node_count {
            // The coordinator announces the cycle length.
            None if node_id == 0 => {
                errs.report(
                    &path.key("node_count"),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        "node_count is required for the PLCA coordinator (node_id 0)",
                    ),
                );
                None
            }
            Some(count) if node_id >= count => {
                errs.report(
                    &path.key("node_id"),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!("node_id {} must be lower than node_count {}", node_id, count),
                    ),
                );
                None
            }
            _ => Some(Plca { node_id, node_count }),
        }
    }
}

/// 100BASE-T1 / 1000BASE-T1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaseT1 {
    pub speed: u16,
    pub role: Role,
    pub autonegotiation: bool,
}

/// 10BASE-T1S.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaseT1s {
    pub speed: u16,
    pub role: Role,
    pub duplex: Duplex,
    pub autonegotiation: bool,
    pub plca: Option<Plca>,
}

/// Medium dependent interface of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MdiConfig {
    BaseT1(BaseT1),
    BaseT1s(BaseT1s),
}

impl MdiConfig {
    pub fn speed(&self) -> u16 {
        match self {
            MdiConfig::BaseT1(c) => c.speed,
            MdiConfig::BaseT1s(c) => c.speed,
        }
    }
}

fn build_base_t1(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<MdiConfig> {
    let mut map = MapReader::open(node, path, errs)?;
    let speed = map.required_with("speed", errs, |n, p, e| int_literal(n, p, e, &[100u16, 1000]));
    let role = map.required::<Role>("role", errs);
    let _ = map.optional_with("duplex", errs, |n, p, e| literal(n, p, e, &[("full", Duplex::Full)]));
    let autonegotiation = map.optional::<bool>("autonegotiation", errs);
    map.finish(errs)?;
    Some(MdiConfig::BaseT1(BaseT1 {
        speed: speed?,
        role: role?,
        autonegotiation: autonegotiation.unwrap_or(false),
    }))
}

fn build_base_t1s(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<MdiConfig> {
    let mut map = MapReader::open(node, path, errs)?;
    let speed = map.required_with("speed", errs, |n, p, e| int_literal(n, p, e, &[10u16]));
    let role = map.required::<Role>("role", errs);
    let duplex = map.optional_with("duplex", errs, |n, p, e| {
        literal(n, p, e, &[("half", Duplex::Half), ("full", Duplex::Full)])
    });
    let autonegotiation = map.optional::<bool>("autonegotiation", errs);
    let plca = map.optional::<Plca>("plca", errs);
    map.finish(errs)?;
    Some(MdiConfig::BaseT1s(BaseT1s {
        speed: speed?,
        role: role?,
        duplex: duplex.unwrap_or(Duplex::Half),
        autonegotiation: autonegotiation.unwrap_or(false),
        plca,
    }))
}

pub const MDI_CONFIG: Discriminator<MdiConfig> = Discriminator {
    subject: "MDI configuration",
    tag_field: "mode",
    variants: &[
        Variant { tag: "base_t1", build: build_base_t1 },
        Variant { tag: "base_t1s", build: build_base_t1s },
    ],
};

impl FromNode for MdiConfig {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        MDI_CONFIG.resolve(node, path, errs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MiiMode {
    Mac,
    Phy,
}

/// Media independent interface between MAC and PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MiiConfig {
    pub mode: MiiMode,
    pub speed: Option<u16>,
}

impl FromNode for MiiConfig {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let mode = map.required_with("mode", errs, |n, p, e| {
            literal(n, p, e, &[("mac", MiiMode::Mac), ("phy", MiiMode::Phy)])
        });
        let speed = map.optional_with("speed", errs, |n, p, e| int_literal(n, p, e, &[10u16, 100, 1000]));
        map.finish(errs)?;
        Some(MiiConfig { mode: mode?, speed })
    }
}

/// A physical port of an ECU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcuPort {
    pub name: String,
    pub mdi_config: MdiConfig,
    pub mii_config: Option<MiiConfig>,
}

impl FromNode for EcuPort {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let mdi_config = map.required::<MdiConfig>("mdi_config", errs);
        let mii_config = map.optional::<MiiConfig>("mii_config", errs);
        map.finish(errs)?;

        let (mdi_config, mii_config) = (mdi_config?, mii_config);
        if let Some(mii_speed) = mii_config.and_then(|m| m.speed) {
            if mii_speed != mdi_config.speed() {
                errs.report(
                    &path.key("mii_config").key("speed"),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!(
                            "MII speed {} does not match MDI speed {}",
                            mii_speed,
                            mdi_config.speed()
                        ),
                    ),
                );
                return None;
            }
        }
        Some(EcuPort {
            name: name?,
            mdi_config,
            mii_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(text: &str) -> (Option<EcuPort>, BuildErrors) {
        let mut errs = BuildErrors::new("ports.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let port = EcuPort::from_node(&node, &FieldPath::root().key("ports").index(0), &mut errs);
        (port, errs)
    }

    #[test]
    fn test_base_t1_port() {
        let (port, errs) = port(
            "name: p1\n\
             mii_config: {mode: phy}\n\
             mdi_config: {mode: base_t1, speed: 100, autonegotiation: false, duplex: full, role: master}\n",
        );
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        assert!(matches!(port.unwrap().mdi_config, MdiConfig::BaseT1(BaseT1 { speed: 100, .. })));
    }

    #[test]
    fn test_base_t1s_port_with_plca() {
        let (port, errs) = port(
            "name: p1\n\
             mii_config: {mode: phy, speed: 10}\n\
             mdi_config: {mode: base_t1s, speed: 10, duplex: half, role: master, plca: {node_id: 0, node_count: 8}}\n",
        );
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let MdiConfig::BaseT1s(cfg) = port.unwrap().mdi_config else {
            panic!("expected base_t1s");
        };
        assert_eq!(cfg.plca, Some(Plca { node_id: 0, node_count: Some(8) }));
    }

    #[test]
    fn test_speed_contradicts_mode() {
        // 100 Mbit/s is a base_t1 shape even though the tag says base_t1s.
        let (port, errs) = port(
            "name: p1\n\
             mdi_config: {mode: base_t1s, speed: 100, duplex: full, role: master}\n",
        );
        assert!(port.is_none());
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::VariantTagMismatch);
        assert_eq!(diag.location.field.to_string(), "ports.0.mdi_config.mode");
    }

    #[test]
    fn test_no_shape_matches() {
        let (port, errs) = port(
            "name: p1\n\
             mdi_config: {mode: base_t1, speed: 10, duplex: half, role: master}\n",
        );
        assert!(port.is_none());
        let diag = &errs.diagnostics()[0];
        // base_t1 rejects the speed, base_t1s would take it; the tag disagrees.
        assert_eq!(diag.kind, DiagnosticKind::VariantTagMismatch);

        let (_, errs) = self::port("name: p1\nmdi_config: {speed: 25, role: master}\n");
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::NoVariantMatched);
        assert_eq!(diag.context.len(), 2);
    }

    #[test]
    fn test_mii_speed_must_match_mdi() {
        let (port, errs) = port(
            "name: p1\n\
             mii_config: {mode: mac, speed: 1000}\n\
             mdi_config: {mode: base_t1, speed: 100, role: slave}\n",
        );
        assert!(port.is_none());
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::InvariantViolation);
    }

    #[test]
    fn test_plca_coordinator_needs_count() {
        let mut errs = BuildErrors::new("ports.flync.yaml");
        let node: Value = serde_yaml::from_str("node_id: 0").unwrap();
        assert!(Plca::from_node(&node, &FieldPath::root(), &mut errs).is_none());
        assert_eq!(errs.diagnostics()[0].location.field.to_string(), "node_count");
    }
}
