//! Link error types and diagnostics.

use thiserror::Error;

use crate::core::entity::EntityKind;
use crate::core::location::Location;
use crate::core::reference::RefKey;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticKind};

/// A reference that could not be turned into a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{} {key} is not declared in the workspace", .target.label())]
    Unresolved {
        target: EntityKind,
        key: RefKey,
        location: Location,
        /// Registered names of the target kind that differ only in case
        similar: Vec<String>,
    },

    #[error("`{name}` is not a {}", .expected.label())]
    KindMismatch {
        expected: EntityKind,
        name: String,
        found: Vec<EntityKind>,
        location: Location,
    },

    #[error("Did not find eventgroups with names {} in service interface `{service}`", quote_all(.missing))]
    MissingEventgroups {
        service: String,
        missing: Vec<String>,
        location: Location,
    },
}

fn quote_all(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl LinkError {
    pub fn location(&self) -> &Location {
        match self {
            LinkError::Unresolved { location, .. }
            | LinkError::KindMismatch { location, .. }
            | LinkError::MissingEventgroups { location, .. } => location,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = self.to_string();
        match self {
            LinkError::Unresolved {
                target,
                key,
                location,
                similar,
            } => {
                let mut diag = Diagnostic::error(DiagnosticKind::UnresolvedReference, message)
                    .at(location.clone())
                    .with_context("kind", target.as_str());
                diag = match key {
                    RefKey::Name(name) => diag.with_context("name", name.clone()),
                    RefKey::Id(id) => diag.with_context("id", id.to_string()),
                };
                if !similar.is_empty() {
                    diag = diag.with_context("did you mean", similar.join(", "));
                }
                diag.with_suggestion(suggestions::UNRESOLVED_REFERENCE)
            }

            LinkError::KindMismatch {
                expected,
                name,
                found,
                location,
            } => {
                let found: Vec<&str> = found.iter().map(|k| k.as_str()).collect();
                Diagnostic::error(DiagnosticKind::KindMismatch, message)
                    .at(location.clone())
                    .with_context("expected", expected.as_str())
                    .with_context("found", found.join(", "))
                    .with_suggestion(format!(
                        "help: Point the field at a {} or rename the `{}` entity",
                        expected.label(),
                        name
                    ))
            }

            LinkError::MissingEventgroups {
                service, location, ..
            } => Diagnostic::error(DiagnosticKind::UnresolvedReference, message)
                .at(location.clone())
                .with_context("service", service.clone()),
        }
    }
}
