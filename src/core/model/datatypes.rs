//! Leaf value types: MAC addresses, IP addresses and versions.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;

use crate::builder::reader::{literal, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(?:(?::[0-9A-Fa-f]{2}){5}|(?:-[0-9A-Fa-f]{2}){5})$")
        .expect("valid regex")
});

// PEP 440 public and local versions, case-insensitive.
static PEP440_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^v?(?:[0-9]+!)?[0-9]+(?:\.[0-9]+)*",
        r"(?:[-_.]?(?:a|b|c|rc|alpha|beta|pre|preview)[-_.]?[0-9]*)?",
        r"(?:-[0-9]+|[-_.]?(?:post|rev|r)[-_.]?[0-9]*)?",
        r"(?:[-_.]?dev[-_.]?[0-9]*)?",
        r"(?:\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?$",
    ))
    .expect("valid regex")
});

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Group bit clear.
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }

    /// Parse `xx:xx:xx:xx:xx:xx` (or `-` separated). The error is a user-facing message.
    pub fn parse(text: &str) -> Result<MacAddress, String> {
        if !text.contains(':') && !text.contains('-') {
            return Err("Must have the format xx:xx:xx:xx:xx:xx".to_string());
        }
        let groups = text.split([':', '-']).count();
        if groups != 6 {
            return Err(format!(
                "Length for a {} MAC address must be 17 characters in 6 groups",
                text
            ));
        }
        if !MAC_RE.is_match(text) {
            return Err(format!("Unrecognized format for MAC address `{}`", text));
        }
        let mut octets = [0u8; 6];
        for (octet, group) in octets.iter_mut().zip(text.split([':', '-'])) {
            *octet = u8::from_str_radix(group, 16).map_err(|e| e.to_string())?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromNode for MacAddress {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        // An unquoted `001122334455` arrives as a number.
        let text = match node {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                errs.error(DiagnosticKind::TypeError, path, "Input should be a valid string");
                return None;
            }
        };
        match MacAddress::parse(&text) {
            Ok(mac) => Some(mac),
            Err(message) => {
                errs.report(
                    path,
                    Diagnostic::error(DiagnosticKind::ValueError, message).with_context("input", text),
                );
                None
            }
        }
    }
}

fn parse_scalar<T: std::str::FromStr>(
    node: &Value,
    path: &FieldPath,
    errs: &mut BuildErrors,
    what: &str,
) -> Option<T> {
    let text = String::from_node(node, path, errs)?;
    match text.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            errs.report(
                path,
                Diagnostic::error(
                    DiagnosticKind::ValueError,
                    format!("Input is not a valid {}", what),
                )
                .with_context("input", text),
            );
            None
        }
    }
}

impl FromNode for Ipv4Addr {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        parse_scalar(node, path, errs, "IPv4 address")
    }
}

impl FromNode for Ipv6Addr {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        parse_scalar(node, path, errs, "IPv6 address")
    }
}

impl FromNode for IpAddr {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        parse_scalar(node, path, errs, "IPv4 or IPv6 address")
    }
}

/// A multicast group address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MulticastAddress(pub IpAddr);

impl FromNode for MulticastAddress {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let ip = IpAddr::from_node(node, path, errs)?;
        if ip.is_multicast() {
            Some(MulticastAddress(ip))
        } else {
            errs.report(
                path,
                Diagnostic::error(
                    DiagnosticKind::ValueError,
                    format!("{} is not a multicast address", ip),
                )
                .with_context("input", ip.to_string()),
            );
            None
        }
    }
}

/// A layer-2 or layer-3 multicast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupAddress {
    Ip(IpAddr),
    Mac(MacAddress),
}

impl FromNode for GroupAddress {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let text = String::from_node(node, path, errs)?;
        let group = if MAC_RE.is_match(&text) {
            MacAddress::parse(&text).ok().map(GroupAddress::Mac)
        } else {
            text.parse::<IpAddr>().ok().map(GroupAddress::Ip)
        };
        let message = match group {
            Some(GroupAddress::Ip(ip)) if ip.is_multicast() => return group,
            Some(GroupAddress::Mac(mac)) if !mac.is_unicast() => return group,
            Some(_) => format!("{} is not a multicast address", text),
            None => "Input is not a valid IP or MAC address".to_string(),
        };
        errs.report(
            path,
            Diagnostic::error(DiagnosticKind::ValueError, message).with_context("input", text),
        );
        None
    }
}

/// Number of leading one bits if `mask` is a contiguous netmask.
pub fn netmask_prefix(mask: Ipv4Addr) -> Option<u32> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    (bits.checked_shl(ones).unwrap_or(0) == 0).then_some(ones)
}

/// Which scheme a version string follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSchema {
    Semver,
    Pep440,
}

impl FromNode for VersionSchema {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        literal(
            node,
            path,
            errs,
            &[("semver", VersionSchema::Semver), ("pep440", VersionSchema::Pep440)],
        )
    }
}

/// A version validated against its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    Semver(semver::Version),
    Pep440(String),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semver(v) => write!(f, "{}", v),
            Version::Pep440(v) => f.write_str(v),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `{version_schema, version}`; the base of every versioned metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseVersion {
    pub version_schema: VersionSchema,
    pub version: Version,
}

impl BaseVersion {
    /// Read the two version fields from an already open mapping.
    pub fn read(map: &mut MapReader<'_>, errs: &mut BuildErrors) -> Option<BaseVersion> {
        let schema = map.required::<VersionSchema>("version_schema", errs);
        let version_path = map.field("version");
        let text = map.required::<String>("version", errs);
        let (schema, text) = (schema?, text?);

        let version = match schema {
            VersionSchema::Semver => semver::Version::parse(&text)
                .map(Version::Semver)
                .map_err(|_| format!("'{}' is not valid Semantic Version", text)),
            VersionSchema::Pep440 => {
                if PEP440_RE.is_match(&text) {
                    Ok(Version::Pep440(text.clone()))
                } else {
                    Err(format!("'{}' is not valid PEP 440 version", text))
                }
            }
        };
        match version {
            Ok(version) => Some(BaseVersion {
                version_schema: schema,
                version,
            }),
            Err(message) => {
                errs.report(
                    &version_path,
                    Diagnostic::error(DiagnosticKind::ValueError, message).with_context("input", text),
                );
                None
            }
        }
    }
}

impl FromNode for BaseVersion {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let version = BaseVersion::read(&mut map, errs);
        map.finish(errs)?;
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_mac_formats() {
        let mac = MacAddress::parse("00:11:22:33:44:55").unwrap();
        assert_eq!(mac.to_string(), "00:11:22:33:44:55");
        assert!(mac.is_unicast());
        assert!(!MacAddress::parse("01:00:5e:00:00:01").unwrap().is_unicast());

        assert!(MacAddress::parse("001122334455")
            .unwrap_err()
            .starts_with("Must have the format"));
        assert!(MacAddress::parse("00:11:22")
            .unwrap_err()
            .starts_with("Length for a 00:11:22 MAC address"));
        assert!(MacAddress::parse("00:11:22:33:xx:XX")
            .unwrap_err()
            .starts_with("Unrecognized format"));
    }

    #[test]
    fn test_unquoted_mac_digits() {
        let mut errs = BuildErrors::new("c.flync.yaml");
        assert!(MacAddress::from_node(&yaml("001122334455"), &FieldPath::root(), &mut errs).is_none());
        assert!(errs.diagnostics()[0].message.starts_with("Must have the format"));
    }

    #[test]
    fn test_ip_parsing() {
        let mut errs = BuildErrors::new("c.flync.yaml");
        let path = FieldPath::root().key("address");
        assert!(Ipv4Addr::from_node(&yaml("10.0.0.100"), &path, &mut errs).is_some());
        assert!(Ipv4Addr::from_node(&yaml("10.0.0.256"), &path, &mut errs).is_none());
        assert!(Ipv6Addr::from_node(&yaml("2001:db8::1"), &path, &mut errs).is_some());
        assert!(MulticastAddress::from_node(&yaml("224.0.0.1"), &path, &mut errs).is_some());
        assert!(MulticastAddress::from_node(&yaml("10.0.0.1"), &path, &mut errs).is_none());
        let messages: Vec<_> = errs.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Input is not a valid IPv4 address",
                "10.0.0.1 is not a multicast address",
            ]
        );
    }

    #[test]
    fn test_group_addresses() {
        let mut errs = BuildErrors::new("sw.flync.yaml");
        let path = FieldPath::root().key("address");
        for group in ["224.0.0.1", "FF02::1", "01:00:5E:00:00:00"] {
            assert!(GroupAddress::from_node(&yaml(group), &path, &mut errs).is_some(), "{}", group);
        }
        assert!(!errs.has_errors());

        for unicast in ["10.0.0.1", "2001:0db8:85a3:0000:0000:8a2e:0370:7334", "00:00:5E:00:00:00", "nowhere"] {
            assert!(GroupAddress::from_node(&yaml(unicast), &path, &mut errs).is_none());
        }
        let messages: Vec<_> = errs.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "10.0.0.1 is not a multicast address",
                "2001:0db8:85a3:0000:0000:8a2e:0370:7334 is not a multicast address",
                "00:00:5E:00:00:00 is not a multicast address",
                "Input is not a valid IP or MAC address",
            ]
        );
    }

    #[test]
    fn test_netmask_prefix() {
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 255, 0)), Some(24));
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 255, 255)), Some(32));
        assert_eq!(netmask_prefix(Ipv4Addr::new(0, 0, 0, 0)), Some(0));
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 0, 255, 0)), None);
    }

    #[test]
    fn test_base_version() {
        let mut errs = BuildErrors::new("m.flync.yaml");
        let path = FieldPath::root().key("release");
        let v = BaseVersion::from_node(&yaml("{version_schema: semver, version: '2.5.1'}"), &path, &mut errs)
            .unwrap();
        assert_eq!(v.version.to_string(), "2.5.1");
        let v = BaseVersion::from_node(&yaml("{version_schema: pep440, version: 1.2.3rc1}"), &path, &mut errs)
            .unwrap();
        assert_eq!(v.version, Version::Pep440("1.2.3rc1".into()));
        assert!(!errs.has_errors());

        assert!(BaseVersion::from_node(&yaml("{version_schema: semver, version: '1.0'}"), &path, &mut errs).is_none());
        assert!(BaseVersion::from_node(&yaml("{version_schema: pep440, version: not_a_version}"), &path, &mut errs).is_none());
        assert!(BaseVersion::from_node(&yaml("{version_schema: unknown, version: '1.0.0'}"), &path, &mut errs).is_none());
        let messages: Vec<_> = errs.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "'1.0' is not valid Semantic Version",
                "'not_a_version' is not valid PEP 440 version",
                "Input should be 'semver' or 'pep440'",
            ]
        );
        assert_eq!(errs.diagnostics()[0].location.field.to_string(), "release.version");
    }
}
