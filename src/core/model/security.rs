//! Packet filtering and MACsec (IEEE 802.1AE / 802.1X MKA) settings.

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{in_range, int_literal, literal, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::core::model::filter::{FrameFilter, Verdict};
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallRule {
    pub name: String,
    pub action: Verdict,
    pub pattern: FrameFilter,
}

impl FromNode for FirewallRule {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let action = map.required::<Verdict>("action", errs);
        let pattern = map.required::<FrameFilter>("pattern", errs);
        map.finish(errs)?;
        Some(FirewallRule {
            name: name?,
            action: action?,
            pattern: pattern?,
        })
    }
}

/// Netfilter-style rule chains of a controller interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Firewall {
    pub default_action: Verdict,
    pub input_rules: Vec<FirewallRule>,
    pub forward_rules: Vec<FirewallRule>,
    pub output_rules: Vec<FirewallRule>,
}

impl FromNode for Firewall {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let default_action = map.required::<Verdict>("default_action", errs);
        let input_rules = map.optional::<Vec<FirewallRule>>("input_rules", errs);
        let forward_rules = map.optional::<Vec<FirewallRule>>("forward_rules", errs);
        let output_rules = map.optional::<Vec<FirewallRule>>("output_rules", errs);
        map.finish(errs)?;

        let firewall = Firewall {
            default_action: default_action?,
            input_rules: input_rules.unwrap_or_default(),
            forward_rules: forward_rules.unwrap_or_default(),
            output_rules: output_rules.unwrap_or_default(),
        };
        let before = errs.error_count();
        for (chain, rules) in [
            ("input_rules", &firewall.input_rules),
            ("forward_rules", &firewall.forward_rules),
            ("output_rules", &firewall.output_rules),
        ] {
            // A later rule with the same pattern can never fire.
            for (i, rule) in rules.iter().enumerate() {
                if let Some(first) = rules[..i].iter().position(|r| r.pattern == rule.pattern) {
                    errs.report(
                        &path.key(chain).index(i).key("pattern"),
                        Diagnostic::error(
                            DiagnosticKind::InvariantViolation,
                            format!("rule `{}` repeats the pattern of an earlier rule", rule.name),
                        )
                        .with_context("first declared at", path.key(chain).index(first).to_string()),
                    );
                }
            }
        }
        (errs.error_count() == before).then_some(firewall)
    }
}

/// One acceptable cipher suite, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CipherPreference {
    IntegrityWithoutConfidentiality { offset_preference: u8 },
    IntegrityWithConfidentiality { offset_preference: u8 },
}

fn integrity_without_confidentiality(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<CipherPreference> {
    let mut map = MapReader::open(node, path, errs)?;
    let offset = map.required_with("offset_preference", errs, |n, p, e| int_literal(n, p, e, &[0u8]));
    map.finish(errs)?;
    Some(CipherPreference::IntegrityWithoutConfidentiality {
        offset_preference: offset?,
    })
}

fn integrity_with_confidentiality(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<CipherPreference> {
    let mut map = MapReader::open(node, path, errs)?;
    let offset = map.required_with("offset_preference", errs, |n, p, e| int_literal(n, p, e, &[0u8, 30, 50]));
    map.finish(errs)?;
    Some(CipherPreference::IntegrityWithConfidentiality {
        offset_preference: offset?,
    })
}

pub const CIPHER_PREFERENCE: Discriminator<CipherPreference> = Discriminator {
    subject: "cipher preference",
    tag_field: "type",
    variants: &[
        Variant {
            tag: "integrity_without_confidentiality",
            build: integrity_without_confidentiality,
        },
        Variant {
            tag: "integrity_with_confidentiality",
            build: integrity_with_confidentiality,
        },
    ],
};

impl FromNode for CipherPreference {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        CIPHER_PREFERENCE.resolve(node, path, errs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MacsecMode {
    Integrity,
    IntegrityWithConfidentiality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    KeyServerAlways,
    KeyServerNever,
    KeyServerByPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantActivation {
    Disabled,
    OnOperPointToPoint,
    Always,
}

/// MACsec and MACsec Key Agreement settings. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacsecConfig {
    /// VLANs whose traffic bypasses MACsec
    pub vlan_bypass: Vec<u16>,
    pub mka_enabled: bool,
    pub hello_time: u32,
    pub bounded_hello_time: u32,
    pub life_time: u32,
    pub sak_retire_time: u32,
    pub macsec_mode: MacsecMode,
    pub kay_on: bool,
    pub key_role: KeyRole,
    pub delay_protect: bool,
    pub participant_activation: ParticipantActivation,
    pub cipher_preference: Vec<CipherPreference>,
}

impl FromNode for MacsecConfig {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let vlan_bypass = map.optional_with("vlan_bypass", errs, |node, path, errs| {
            let ids = Vec::<u16>::from_node(node, path, errs)?;
            let mut valid = true;
            for (i, id) in ids.iter().enumerate() {
                valid &= in_range(*id, &(0..=4095), &path.index(i), errs).is_some();
            }
            valid.then_some(ids)
        });
        let mka_enabled = map.required::<bool>("mka_enabled", errs);
        let hello_time = map.required::<u32>("hello_time", errs);
        let bounded_hello_time = map.required::<u32>("bounded_hello_time", errs);
        let life_time = map.required::<u32>("life_time", errs);
        let sak_retire_time = map.required::<u32>("sak_retire_time", errs);
        let macsec_mode = map.required_with("macsec_mode", errs, |n, p, e| {
            literal(
                n,
                p,
                e,
                &[
                    ("integrity", MacsecMode::Integrity),
                    ("integrity_with_confidentiality", MacsecMode::IntegrityWithConfidentiality),
                ],
            )
        });
        let kay_on = map.required::<bool>("kay_on", errs);
        let key_role = map.required_with("key_role", errs, |n, p, e| {
            literal(
                n,
                p,
                e,
                &[
                    ("key_server_always", KeyRole::KeyServerAlways),
                    ("key_server_never", KeyRole::KeyServerNever),
                    ("key_server_by_priority", KeyRole::KeyServerByPriority),
                ],
            )
        });
        let delay_protect = map.required::<bool>("delay_protect", errs);
        let participant_activation = map.required_with("participant_activation", errs, |n, p, e| {
            literal(
                n,
                p,
                e,
                &[
                    ("disabled", ParticipantActivation::Disabled),
                    ("on_oper_point_to_point", ParticipantActivation::OnOperPointToPoint),
                    ("always", ParticipantActivation::Always),
                ],
            )
        });
        let cipher_preference = map.optional::<Vec<CipherPreference>>("cipher_preference", errs);
        map.finish(errs)?;

        Some(MacsecConfig {
            vlan_bypass: vlan_bypass.unwrap_or_default(),
            mka_enabled: mka_enabled?,
            hello_time: hello_time?,
            bounded_hello_time: bounded_hello_time?,
            life_time: life_time?,
            sak_retire_time: sak_retire_time?,
            macsec_mode: macsec_mode?,
            kay_on: kay_on?,
            key_role: key_role?,
            delay_protect: delay_protect?,
            participant_activation: participant_activation?,
            cipher_preference: cipher_preference.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MACSEC: &str = "\
vlan_bypass: [1, 2, 3]
mka_enabled: true
hello_time: 1000
bounded_hello_time: 2000
life_time: 100000
sak_retire_time: 20000
macsec_mode: integrity
kay_on: true
key_role: key_server_always
delay_protect: false
participant_activation: always
";

    const FIREWALL: &str = "\
default_action: drop
input_rules:
  - {name: allow_someip, action: accept, pattern: {src_ipv4: 10.0.0.1}}
  - {name: allow_someip, action: drop, pattern: {src_ipv4: 10.0.0.2}}
";

    fn build<T: FromNode>(text: &str) -> (Option<T>, BuildErrors) {
        let mut errs = BuildErrors::new("controllers/c1.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let value = T::from_node(&node, &FieldPath::root(), &mut errs);
        (value, errs)
    }

    fn fields(errs: &BuildErrors) -> Vec<String> {
        errs.diagnostics()
            .iter()
            .map(|d| d.location.field.to_string())
            .collect()
    }

    #[test]
    fn test_firewall_rule_names_may_repeat() {
        let (fw, errs) = build::<Firewall>(FIREWALL);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let fw = fw.unwrap();
        assert_eq!(fw.default_action, Verdict::Drop);
        assert_eq!(fw.input_rules.len(), 2);
        assert!(fw.output_rules.is_empty());
    }

    #[test]
    fn test_firewall_repeated_pattern() {
        let (fw, errs) = build::<Firewall>(&FIREWALL.replace("10.0.0.2", "10.0.0.1"));
        assert!(fw.is_none());
        assert_eq!(fields(&errs), vec!["input_rules.1.pattern"]);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::InvariantViolation);
    }

    #[test]
    fn test_firewall_same_pattern_in_other_chain() {
        let text = format!(
            "{}output_rules:\n  - {{name: out, action: accept, pattern: {{src_ipv4: 10.0.0.1}}}}\n",
            FIREWALL
        );
        let (fw, errs) = build::<Firewall>(&text);
        assert!(errs.diagnostics().is_empty());
        assert_eq!(fw.unwrap().output_rules.len(), 1);
    }

    #[test]
    fn test_firewall_unknown_action() {
        let (_, errs) = build::<Firewall>(&FIREWALL.replace("action: drop, ", "action: reject, "));
        assert_eq!(fields(&errs), vec!["input_rules.1.action"]);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::LiteralError);
    }

    #[test]
    fn test_macsec() {
        let (m, errs) = build::<MacsecConfig>(MACSEC);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let m = m.unwrap();
        assert_eq!(m.vlan_bypass, vec![1, 2, 3]);
        assert_eq!(m.key_role, KeyRole::KeyServerAlways);
        assert!(m.cipher_preference.is_empty());
    }

    #[test]
    fn test_macsec_vlan_bypass_range() {
        let (m, errs) = build::<MacsecConfig>(&MACSEC.replace("[1, 2, 3]", "[10000, 2, 3]"));
        assert!(m.is_none());
        assert_eq!(fields(&errs), vec!["vlan_bypass.0"]);
    }

    #[test]
    fn test_cipher_offsets() {
        let with = format!(
            "{}cipher_preference:\n  - {{type: integrity_with_confidentiality, offset_preference: 30}}\n",
            MACSEC
        );
        let (m, errs) = build::<MacsecConfig>(&with);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        assert_eq!(
            m.unwrap().cipher_preference,
            vec![CipherPreference::IntegrityWithConfidentiality { offset_preference: 30 }]
        );

        let (m, errs) = build::<MacsecConfig>(&with.replace("offset_preference: 30", "offset_preference: 40"));
        assert!(m.is_none());
        assert_eq!(fields(&errs), vec!["cipher_preference.0"]);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::NoVariantMatched);

        let without = with.replace("integrity_with_confidentiality,", "integrity_without_confidentiality,");
        let (_, errs) = build::<MacsecConfig>(&without);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::VariantTagMismatch);
        let (m, errs) = build::<MacsecConfig>(&without.replace("offset_preference: 30", "offset_preference: 0"));
        assert!(errs.diagnostics().is_empty());
        assert!(m.is_some());
    }
}
