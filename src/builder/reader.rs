//! Typed reading of raw document trees.
//!
//! Builders walk a [`serde_yaml::Value`] with a [`MapReader`] and record every problem
//! in a [`BuildErrors`] sink instead of stopping at the first one. A builder returns
//! `None` when anything beneath it failed; its errors are already recorded.

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::core::location::{FieldPath, Location};
use crate::util::diagnostic::{Diagnostic, DiagnosticKind, Severity};

/// Error sink for one document.
#[derive(Debug, Clone)]
pub struct BuildErrors {
    document: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl BuildErrors {
    pub fn new(document: impl Into<PathBuf>) -> Self {
        BuildErrors {
            document: document.into(),
            diagnostics: Vec::new(),
        }
    }

    /// An empty sink for the same document, used to try a shape without committing.
    pub fn scratch(&self) -> Self {
        BuildErrors::new(self.document.clone())
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn location(&self, field: &FieldPath) -> Location {
        Location::new(self.document.clone(), field.clone())
    }

    /// Record a diagnostic at `field`.
    pub fn report(&mut self, field: &FieldPath, diagnostic: Diagnostic) {
        let location = self.location(field);
        self.diagnostics.push(diagnostic.at(location));
    }

    pub fn error(&mut self, kind: DiagnosticKind, field: &FieldPath, message: impl Into<String>) {
        self.report(field, Diagnostic::error(kind, message));
    }

    pub fn warning(&mut self, kind: DiagnosticKind, field: &FieldPath, message: impl Into<String>) {
        self.report(field, Diagnostic::warning(kind, message));
    }

    /// Number of error-severity diagnostics so far.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Move every diagnostic of `other` into this sink.
    pub fn absorb(&mut self, other: BuildErrors) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Conversion from a raw node into a typed value.
pub trait FromNode: Sized {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self>;
}

impl FromNode for String {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        match node {
            Value::String(s) => Some(s.clone()),
            _ => {
                errs.error(DiagnosticKind::TypeError, path, "Input should be a valid string");
                None
            }
        }
    }
}

impl FromNode for bool {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        match node {
            Value::Bool(b) => Some(*b),
            _ => {
                errs.error(DiagnosticKind::TypeError, path, "Input should be a valid boolean");
                None
            }
        }
    }
}

macro_rules! impl_from_node_unsigned {
    ($($ty:ty),*) => {
        $(
            impl FromNode for $ty {
                fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
                    let Value::Number(number) = node else {
                        errs.error(DiagnosticKind::TypeError, path, "Input should be a valid integer");
                        return None;
                    };
                    if let Some(value) = number.as_u64() {
                        match <$ty>::try_from(value) {
                            Ok(value) => Some(value),
                            Err(_) => {
                                errs.report(
                                    path,
                                    Diagnostic::error(
                                        DiagnosticKind::ValueError,
                                        format!("Input should be less than or equal to {}", <$ty>::MAX),
                                    )
                                    .with_context("input", value.to_string()),
                                );
                                None
                            }
                        }
                    } else if number.as_i64().is_some() {
                        errs.report(
                            path,
                            Diagnostic::error(
                                DiagnosticKind::ValueError,
                                "Input should be greater than or equal to 0",
                            )
                            .with_context("input", number.to_string()),
                        );
                        None
                    } else {
                        errs.error(
                            DiagnosticKind::TypeError,
                            path,
                            "Input should be a valid integer, got a number with a fractional part",
                        );
                        None
                    }
                }
            }
        )*
    };
}

impl_from_node_unsigned!(u8, u16, u32, u64);

macro_rules! impl_from_node_signed {
    ($($ty:ty),*) => {
        $(
            impl FromNode for $ty {
                fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
                    let Value::Number(number) = node else {
                        errs.error(DiagnosticKind::TypeError, path, "Input should be a valid integer");
                        return None;
                    };
                    let Some(value) = number.as_i64() else {
                        let message = if number.is_f64() {
                            "Input should be a valid integer, got a number with a fractional part".to_string()
                        } else {
                            format!("Input should be less than or equal to {}", <$ty>::MAX)
                        };
                        errs.report(
                            path,
                            Diagnostic::error(DiagnosticKind::TypeError, message)
                                .with_context("input", number.to_string()),
                        );
                        return None;
                    };
                    match <$ty>::try_from(value) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            let bound = if value < 0 {
                                format!("Input should be greater than or equal to {}", <$ty>::MIN)
                            } else {
                                format!("Input should be less than or equal to {}", <$ty>::MAX)
                            };
                            errs.report(
                                path,
                                Diagnostic::error(DiagnosticKind::ValueError, bound)
                                    .with_context("input", value.to_string()),
                            );
                            None
                        }
                    }
                }
            }
        )*
    };
}

impl_from_node_signed!(i8, i16, i32, i64);

impl<T: FromNode> FromNode for Vec<T> {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let Value::Sequence(items) = node else {
            errs.error(DiagnosticKind::TypeError, path, "Input should be a valid list");
            return None;
        };
        // Every item is visited so all of their errors are reported.
        let built: Vec<Option<T>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_node(item, &path.index(i), errs))
            .collect();
        built.into_iter().collect()
    }
}

/// A list whose failed items are reported and dropped; the rest are kept with their index.
///
/// Used for the top-level lists of a document so one broken entry does not hide its siblings.
pub fn partial_list<T: FromNode>(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Vec<(usize, T)>> {
    let Value::Sequence(items) = node else {
        errs.error(DiagnosticKind::TypeError, path, "Input should be a valid list");
        return None;
    };
    Some(
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| T::from_node(item, &path.index(i), errs).map(|built| (i, built)))
            .collect(),
    )
}

/// Match a scalar against a fixed table of string literals.
pub fn literal<T: Copy>(
    node: &Value,
    path: &FieldPath,
    errs: &mut BuildErrors,
    table: &[(&str, T)],
) -> Option<T> {
    if let Value::String(s) = node {
        if let Some((_, value)) = table.iter().find(|(name, _)| name == s) {
            return Some(*value);
        }
    }
    let quoted: Vec<String> = table.iter().map(|(name, _)| format!("'{}'", name)).collect();
    errs.report(
        path,
        Diagnostic::error(
            DiagnosticKind::LiteralError,
            format!("Input should be {}", join_alternatives(&quoted)),
        )
        .with_context("input", describe(node)),
    );
    None
}

/// Match an integer against a fixed set of allowed values.
pub fn int_literal<T>(node: &Value, path: &FieldPath, errs: &mut BuildErrors, allowed: &[T]) -> Option<T>
where
    T: FromNode + PartialEq + Copy + Display,
{
    if let Value::Number(_) = node {
        let mut scratch = errs.scratch();
        if let Some(value) = T::from_node(node, path, &mut scratch) {
            if allowed.contains(&value) {
                return Some(value);
            }
        }
    }
    let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
    errs.report(
        path,
        Diagnostic::error(
            DiagnosticKind::LiteralError,
            format!("Input should be {}", join_alternatives(&options)),
        )
        .with_context("input", describe(node)),
    );
    None
}

/// Check a value against an inclusive range.
pub fn in_range<T>(value: T, range: &RangeInclusive<T>, path: &FieldPath, errs: &mut BuildErrors) -> Option<T>
where
    T: PartialOrd + Display + Copy,
{
    if value < *range.start() {
        errs.report(
            path,
            Diagnostic::error(
                DiagnosticKind::ValueError,
                format!("Input should be greater than or equal to {}", range.start()),
            )
            .with_context("input", value.to_string()),
        );
        None
    } else if value > *range.end() {
        errs.report(
            path,
            Diagnostic::error(
                DiagnosticKind::ValueError,
                format!("Input should be less than or equal to {}", range.end()),
            )
            .with_context("input", value.to_string()),
        );
        None
    } else {
        Some(value)
    }
}

/// `'a', 'b' or 'c'`
fn join_alternatives(options: &[String]) -> String {
    match options {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

/// Short rendering of a raw value for diagnostic context.
pub fn describe(node: &Value) -> String {
    match node {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) => "<list>".to_string(),
        Value::Mapping(_) => "<mapping>".to_string(),
        Value::Tagged(tagged) => format!("{}", tagged.tag),
    }
}

/// Field-by-field reader over one mapping.
///
/// Every key read (or [`skip`](MapReader::skip)ped) is remembered; [`finish`](MapReader::finish)
/// reports the rest as forbidden extras.
#[derive(Debug)]
pub struct MapReader<'a> {
    map: &'a Mapping,
    path: FieldPath,
    known: Vec<&'static str>,
    errors_at_open: usize,
}

impl<'a> MapReader<'a> {
    /// Start reading `node`, which must be a mapping.
    pub fn open(node: &'a Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        match node {
            Value::Mapping(map) => Some(MapReader {
                map,
                path: path.clone(),
                known: Vec::new(),
                errors_at_open: errs.error_count(),
            }),
            _ => {
                errs.report(
                    path,
                    Diagnostic::error(DiagnosticKind::TypeError, "Input should be a valid dictionary")
                        .with_context("input", describe(node)),
                );
                None
            }
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Path of a field of this mapping.
    pub fn field(&self, key: &str) -> FieldPath {
        self.path.key(key)
    }

    /// Raw value of `key`; marks the key as known. Null counts as absent.
    pub fn get(&mut self, key: &'static str) -> Option<&'a Value> {
        self.skip(key);
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Mark `key` as known without reading it.
    pub fn skip(&mut self, key: &'static str) {
        if !self.known.contains(&key) {
            self.known.push(key);
        }
    }

    pub fn required<T: FromNode>(&mut self, key: &'static str, errs: &mut BuildErrors) -> Option<T> {
        self.required_with(key, errs, T::from_node)
    }

    pub fn optional<T: FromNode>(&mut self, key: &'static str, errs: &mut BuildErrors) -> Option<T> {
        self.optional_with(key, errs, T::from_node)
    }

    /// A required field converted by `build`.
    pub fn required_with<T, F>(&mut self, key: &'static str, errs: &mut BuildErrors, build: F) -> Option<T>
    where
        F: FnOnce(&Value, &FieldPath, &mut BuildErrors) -> Option<T>,
    {
        let path = self.field(key);
        match self.get(key) {
            Some(value) => build(value, &path, errs),
            None => {
                errs.error(DiagnosticKind::Missing, &path, "Field required");
                None
            }
        }
    }

    /// An optional field converted by `build`. Absent yields `None` without error.
    pub fn optional_with<T, F>(&mut self, key: &'static str, errs: &mut BuildErrors, build: F) -> Option<T>
    where
        F: FnOnce(&Value, &FieldPath, &mut BuildErrors) -> Option<T>,
    {
        let path = self.field(key);
        self.get(key).and_then(|value| build(value, &path, errs))
    }

    /// A required unsigned field within `range`.
    pub fn required_in<T>(&mut self, key: &'static str, range: RangeInclusive<T>, errs: &mut BuildErrors) -> Option<T>
    where
        T: FromNode + PartialOrd + Display + Copy,
    {
        self.required_with(key, errs, |node, path, errs| {
            T::from_node(node, path, errs).and_then(|v| in_range(v, &range, path, errs))
        })
    }

    /// An optional unsigned field within `range`.
    pub fn optional_in<T>(&mut self, key: &'static str, range: RangeInclusive<T>, errs: &mut BuildErrors) -> Option<T>
    where
        T: FromNode + PartialOrd + Display + Copy,
    {
        self.optional_with(key, errs, |node, path, errs| {
            T::from_node(node, path, errs).and_then(|v| in_range(v, &range, path, errs))
        })
    }

    /// A field fixed to a single literal, defaulting to it when absent.
    pub fn constant(&mut self, key: &'static str, value: &'static str, errs: &mut BuildErrors) {
        let path = self.field(key);
        if let Some(node) = self.get(key) {
            literal(node, &path, errs, &[(value, ())]);
        }
    }

    /// Report unknown keys. Returns `None` if any error was recorded since `open`,
    /// including errors in nested values.
    pub fn finish(self, errs: &mut BuildErrors) -> Option<()> {
        for key in self.map.keys() {
            match key {
                Value::String(name) if self.known.contains(&name.as_str()) => {}
                Value::String(name) => {
                    errs.report(
                        &self.path.key(name.as_str()),
                        Diagnostic::error(DiagnosticKind::ExtraForbidden, "Extra inputs are not permitted"),
                    );
                }
                other => {
                    errs.report(
                        &self.path.key(describe(other)),
                        Diagnostic::error(DiagnosticKind::ExtraForbidden, "Extra inputs are not permitted"),
                    );
                }
            }
        }
        (errs.error_count() == self.errors_at_open).then_some(())
    }
}
