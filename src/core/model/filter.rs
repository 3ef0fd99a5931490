//! Frame match patterns shared by firewall rules and switch TCAM rules.

use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::RangeInclusive;

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::reader::{describe, in_range, literal, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::core::model::controller::Protocol;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

/// A single value or an inclusive `from_value..=to_value` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ValueMatch<T> {
    Exact(T),
    Range { from_value: T, to_value: T },
}

impl<T: PartialOrd + Copy> ValueMatch<T> {
    pub fn contains(&self, value: T) -> bool {
        match *self {
            ValueMatch::Exact(v) => v == value,
            ValueMatch::Range { from_value, to_value } => from_value <= value && value <= to_value,
        }
    }
}

/// Read an integer or a range, every bound within `bounds`.
pub fn value_match<T>(
    node: &Value,
    path: &FieldPath,
    errs: &mut BuildErrors,
    bounds: RangeInclusive<T>,
) -> Option<ValueMatch<T>>
where
    T: FromNode + PartialOrd + Display + Copy,
{
    match node {
        Value::Mapping(_) => {
            let mut map = MapReader::open(node, path, errs)?;
            let from = map.required_in("from_value", bounds.clone(), errs);
            let to = map.required_in("to_value", bounds, errs);
            map.finish(errs)?;
            let (from_value, to_value) = (from?, to?);
            if from_value > to_value {
                errs.report(
                    &path.key("to_value"),
                    Diagnostic::error(
                        DiagnosticKind::ValueError,
                        format!("range end {} is below its start {}", to_value, from_value),
                    ),
                );
                return None;
            }
            Some(ValueMatch::Range { from_value, to_value })
        }
        _ => {
            let value = T::from_node(node, path, errs)?;
            in_range(value, &bounds, path, errs).map(ValueMatch::Exact)
        }
    }
}

/// Header fields a frame is matched on. Absent fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FrameFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlanid: Option<ValueMatch<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcp: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ipv4: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ipv4: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ipv6: Option<Ipv6Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ipv6: Option<Ipv6Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<ValueMatch<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<ValueMatch<u16>>,
}

impl FromNode for FrameFilter {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let vlanid = map.optional_with("vlanid", errs, |n, p, e| value_match(n, p, e, 0..=4095u16));
        let pcp = map.optional_in("pcp", 0..=7u8, errs);
        let src_ipv4 = map.optional::<Ipv4Addr>("src_ipv4", errs);
        let dst_ipv4 = map.optional::<Ipv4Addr>("dst_ipv4", errs);
        let src_ipv6 = map.optional::<Ipv6Addr>("src_ipv6", errs);
        let dst_ipv6 = map.optional::<Ipv6Addr>("dst_ipv6", errs);
        let protocol = map.optional::<Protocol>("protocol", errs);
        let src_port = map.optional_with("src_port", errs, |n, p, e| value_match(n, p, e, 0..=u16::MAX));
        let dst_port = map.optional_with("dst_port", errs, |n, p, e| value_match(n, p, e, 0..=u16::MAX));
        map.finish(errs)?;

        let filter = FrameFilter {
            vlanid,
            pcp,
            src_ipv4,
            dst_ipv4,
            src_ipv6,
            dst_ipv6,
            protocol,
            src_port,
            dst_port,
        };
        if filter == FrameFilter::default() {
            errs.report(
                path,
                Diagnostic::error(DiagnosticKind::ValueError, "frame filter must set at least one field")
                    .with_context("input", describe(node)),
            );
            return None;
        }
        let mut valid = true;
        for (v4, v6, side) in [
            (filter.src_ipv4.is_some(), filter.src_ipv6.is_some(), "src"),
            (filter.dst_ipv4.is_some(), filter.dst_ipv6.is_some(), "dst"),
        ] {
            if v4 && v6 {
                errs.report(
                    &path.key(format!("{}_ipv6", side)),
                    Diagnostic::error(
                        DiagnosticKind::InvariantViolation,
                        format!("{side}_ipv4 and {side}_ipv6 are mutually exclusive"),
                    ),
                );
                valid = false;
            }
        }
        valid.then_some(filter)
    }
}

/// `accept` or `drop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Drop,
}

impl FromNode for Verdict {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        literal(node, path, errs, &[("accept", Verdict::Accept), ("drop", Verdict::Drop)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(text: &str) -> (Option<FrameFilter>, BuildErrors) {
        let mut errs = BuildErrors::new("controllers/c1.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let f = FrameFilter::from_node(&node, &FieldPath::root().key("pattern"), &mut errs);
        (f, errs)
    }

    fn fields(errs: &BuildErrors) -> Vec<String> {
        errs.diagnostics()
            .iter()
            .map(|d| d.location.field.to_string())
            .collect()
    }

    #[test]
    fn test_ports_and_ranges() {
        let (f, errs) = filter("vlanid: 10\nsrc_ipv4: 10.10.5.5\nsrc_port: 40\ndst_port: {from_value: 4, to_value: 10}\n");
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let f = f.unwrap();
        assert_eq!(f.vlanid, Some(ValueMatch::Exact(10)));
        let dst = f.dst_port.unwrap();
        assert!(dst.contains(4) && dst.contains(10) && !dst.contains(11));
    }

    #[test]
    fn test_empty_filter() {
        let (f, errs) = filter("vlanid: null\n");
        assert!(f.is_none());
        assert_eq!(fields(&errs), vec!["pattern"]);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::ValueError);
    }

    #[test]
    fn test_out_of_range_values() {
        let (_, errs) = filter("vlanid: 4096\n");
        assert_eq!(fields(&errs), vec!["pattern.vlanid"]);

        let (_, errs) = filter("vlanid: {from_value: 4095, to_value: 4097}\n");
        assert_eq!(fields(&errs), vec!["pattern.vlanid.to_value"]);

        let (_, errs) = filter("src_port: -20\npcp: 10\n");
        assert_eq!(fields(&errs), vec!["pattern.pcp", "pattern.src_port"]);

        let (_, errs) = filter("dst_port: {from_value: 10, to_value: 4}\n");
        assert_eq!(errs.diagnostics()[0].message, "range end 4 is below its start 10");
    }

    #[test]
    fn test_ipv4_and_ipv6_are_exclusive() {
        let (f, errs) = filter("dst_ipv6: \"2001:0db8:85a3:0000:0000:8a2e:0370:7334\"\ndst_ipv4: 10.0.0.1\n");
        assert!(f.is_none());
        assert_eq!(fields(&errs), vec!["pattern.dst_ipv6"]);
        assert_eq!(errs.diagnostics()[0].kind, DiagnosticKind::InvariantViolation);

        let (f, errs) = filter("src_ipv4: 10.0.0.1\ndst_ipv6: \"ff02::1\"\n");
        assert!(errs.diagnostics().is_empty());
        assert!(f.is_some());
    }
}
