//! Polymorphic fields - choosing one variant out of a fixed candidate table.
//!
//! Every candidate is tried against the node with the tag field removed. The tag, when
//! present, only narrows the choice; it never replaces shape validation.

use serde_yaml::Value;

use crate::builder::reader::{describe, BuildErrors};
use crate::core::location::FieldPath;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticKind, Severity};

/// Builder for one candidate shape.
pub type VariantBuilder<T> = fn(&Value, &FieldPath, &mut BuildErrors) -> Option<T>;

/// One candidate shape.
pub struct Variant<T: 'static> {
    pub tag: &'static str,
    pub build: VariantBuilder<T>,
}

/// A closed, ordered set of candidate shapes for one field.
pub struct Discriminator<T: 'static> {
    /// What the field holds, for messages ("MDI configuration")
    pub subject: &'static str,
    /// Key that may carry an explicit variant tag
    pub tag_field: &'static str,
    pub variants: &'static [Variant<T>],
}

struct Attempt<T> {
    tag: &'static str,
    value: Option<T>,
    errors: BuildErrors,
}

impl<T: 'static> Discriminator<T> {
    pub fn tags(&self) -> Vec<&'static str> {
        self.variants.iter().map(|v| v.tag).collect()
    }

    /// Resolve `node` to exactly one variant.
    pub fn resolve(&self, node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<T> {
        let tag = match self.read_tag(node, path, errs) {
            Ok(tag) => tag,
            Err(()) => return None,
        };
        let stripped = self.strip_tag(node);

        let mut attempts: Vec<Attempt<T>> = self
            .variants
            .iter()
            .map(|variant| {
                let mut scratch = errs.scratch();
                let value = (variant.build)(&stripped, path, &mut scratch);
                Attempt {
                    tag: variant.tag,
                    value: value.filter(|_| !scratch.has_errors()),
                    errors: scratch,
                }
            })
            .collect();

        let matched: Vec<usize> = attempts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.value.is_some())
            .map(|(i, _)| i)
            .collect();

        let chosen = match (matched.as_slice(), tag) {
            ([], _) => {
                errs.report(path, self.no_match(&attempts));
                return None;
            }
            ([only], None) => *only,
            ([only], Some(tag)) if attempts[*only].tag == tag => *only,
            (matched, Some(tag)) => match matched.iter().find(|&&i| attempts[i].tag == tag) {
                Some(i) => *i,
                None => {
                    let shapes: Vec<&str> = matched.iter().map(|&i| attempts[i].tag).collect();
                    errs.report(
                        &path.key(self.tag_field),
                        Diagnostic::error(
                            DiagnosticKind::VariantTagMismatch,
                            format!(
                                "{} is tagged `{}` but its fields match `{}`",
                                self.subject,
                                tag,
                                shapes.join("`, `")
                            ),
                        )
                        .with_context("tag", tag)
                        .with_context("matching shapes", shapes.join(", ")),
                    );
                    return None;
                }
            },
            (matched, None) => {
                let shapes: Vec<&str> = matched.iter().map(|&i| attempts[i].tag).collect();
                errs.report(
                    path,
                    Diagnostic::error(
                        DiagnosticKind::AmbiguousVariant,
                        format!("{} matches more than one shape", self.subject),
                    )
                    .with_context("matching shapes", shapes.join(", "))
                    .with_suggestion(format!(
                        "help: Add `{}: <{}>` to choose one",
                        self.tag_field,
                        shapes.join("|")
                    )),
                );
                return None;
            }
        };

        let attempt = attempts.swap_remove(chosen);
        // Warnings raised while building the chosen shape still count.
        for diag in attempt.errors.into_diagnostics() {
            if diag.severity == Severity::Warning {
                let field = diag.location.field.clone();
                errs.report(&field, diag);
            }
        }
        attempt.value
    }

    /// The explicit tag, if any. `Err` when the tag itself is invalid (already reported).
    fn read_tag(&self, node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Result<Option<&'static str>, ()> {
        let Some(raw) = node.as_mapping().and_then(|m| m.get(self.tag_field)) else {
            return Ok(None);
        };
        let tag_path = path.key(self.tag_field);
        match raw.as_str().and_then(|s| self.variants.iter().find(|v| v.tag == s)) {
            Some(variant) => Ok(Some(variant.tag)),
            None => {
                let expected: Vec<String> = self.tags().iter().map(|t| format!("'{}'", t)).collect();
                errs.report(
                    &tag_path,
                    Diagnostic::error(
                        DiagnosticKind::LiteralError,
                        format!(
                            "Input tag '{}' found using '{}' does not match any of the expected tags: {}",
                            describe(raw),
                            self.tag_field,
                            expected.join(", ")
                        ),
                    )
                    .with_context("input", describe(raw)),
                );
                Err(())
            }
        }
    }

    fn strip_tag(&self, node: &Value) -> Value {
        match node {
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .filter(|(key, _)| key.as_str() != Some(self.tag_field))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// One diagnostic listing why each candidate, in declaration order, was rejected.
    fn no_match(&self, attempts: &[Attempt<T>]) -> Diagnostic {
        let mut diag = Diagnostic::error(
            DiagnosticKind::NoVariantMatched,
            format!(
                "{} does not match any of: {}",
                self.subject,
                self.tags().join(", ")
            ),
        );
        for attempt in attempts {
            let reasons: Vec<String> = attempt
                .errors
                .diagnostics()
                .iter()
                .filter(|d| d.is_error())
                .map(|d| {
                    if d.location.field.is_root() {
                        d.message.clone()
                    } else {
                        format!("{}: {}", d.location.field, d.message)
                    }
                })
                .collect();
            diag = diag.with_context(attempt.tag, reasons.join("; "));
        }
        diag.with_suggestion(suggestions::NO_VARIANT)
    }
}
