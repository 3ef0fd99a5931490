//! User-facing diagnostics.
//!
//! Every recoverable problem found while loading a workspace ends up as a
//! [`Diagnostic`]: what went wrong, where, the values involved and, when there is an
//! obvious fix, a suggestion.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::core::location::Location;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a document has the wrong suffix.
    pub const DOCUMENT_EXTENSION: &str = "help: Workspace documents must end in `.flync.yaml`";

    /// Suggestion when a reference cannot be resolved.
    pub const UNRESOLVED_REFERENCE: &str =
        "help: Check the spelling or declare the entity in one of the workspace documents";

    /// Suggestion when a name is declared twice.
    pub const DUPLICATE_NAME: &str = "help: Rename one of the entities; names are unique per kind";

    /// Suggestion when no variant of a polymorphic field matched.
    pub const NO_VARIANT: &str = "help: Compare the document against the candidate shapes listed above";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// What class of problem a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A required document is absent
    MissingDocument,
    /// A document exists but could not be read
    ReadError,
    /// A file sits where a document is expected but has the wrong suffix
    InvalidFormat,
    /// A document is not valid YAML
    ParseError,
    /// A mapping declares the same key twice
    DuplicateKey,
    /// A document nobody asked for
    UnexpectedDocument,
    /// A required field is absent
    Missing,
    /// A field the schema does not know
    ExtraForbidden,
    /// Wrong scalar or container type
    TypeError,
    /// A value outside a fixed set of literals
    LiteralError,
    /// A value that fails a range or format constraint
    ValueError,
    /// A single-document invariant spanning several fields
    InvariantViolation,
    /// Two entities of the same kind share a name
    DuplicateName,
    /// Two entities of the same kind share an id
    DuplicateId,
    /// A reference names nothing
    UnresolvedReference,
    /// A reference names an entity of another kind
    KindMismatch,
    /// No variant of a polymorphic field matched
    NoVariantMatched,
    /// More than one variant matched and nothing disambiguates
    AmbiguousVariant,
    /// An explicit tag contradicts the matched shape
    VariantTagMismatch,
    /// A notifier that no eventgroup carries
    UnassignedEvent,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MissingDocument => "missing_document",
            DiagnosticKind::ReadError => "read_error",
            DiagnosticKind::InvalidFormat => "invalid_format",
            DiagnosticKind::ParseError => "parse_error",
            DiagnosticKind::DuplicateKey => "duplicate_key",
            DiagnosticKind::UnexpectedDocument => "unexpected_document",
            DiagnosticKind::Missing => "missing",
            DiagnosticKind::ExtraForbidden => "extra_forbidden",
            DiagnosticKind::TypeError => "type_error",
            DiagnosticKind::LiteralError => "literal_error",
            DiagnosticKind::ValueError => "value_error",
            DiagnosticKind::InvariantViolation => "invariant_violation",
            DiagnosticKind::DuplicateName => "duplicate_name",
            DiagnosticKind::DuplicateId => "duplicate_id",
            DiagnosticKind::UnresolvedReference => "unresolved_reference",
            DiagnosticKind::KindMismatch => "kind_mismatch",
            DiagnosticKind::NoVariantMatched => "no_variant_matched",
            DiagnosticKind::AmbiguousVariant => "ambiguous_variant",
            DiagnosticKind::VariantTagMismatch => "variant_tag_mismatch",
            DiagnosticKind::UnassignedEvent => "unassigned_event",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic message with location, structured context and optional suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Problem class
    pub kind: DiagnosticKind,
    /// Severity level
    pub severity: Severity,
    /// Primary message
    pub message: String,
    /// Document and field the problem belongs to
    pub location: Location,
    /// Structured details, in insertion order
    pub context: Vec<(String, String)>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Error,
            message: message.into(),
            location: Location::default(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(kind, message)
        }
    }

    /// Attach the location the diagnostic refers to.
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Add a structured context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Context rendered as `key=value` pairs, joined with `, `.
    pub fn context_line(&self) -> String {
        self.context
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            }
        };

        output.push_str(&format!(
            "{}[{}]: {}\n",
            severity_str, self.kind, self.message
        ));
        output.push_str(&format!("  --> {}\n", self.location));

        for (key, value) in &self.context {
            output.push_str(&format!("  → {}: {}\n", key, value));
        }

        if !self.suggestions.is_empty() {
            for suggestion in &self.suggestions {
                output.push_str(&format!("  {}\n", suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// A structural failure that aborts a load. No workspace is produced.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum LoadError {
    #[error("workspace root not found: {}", .path.display())]
    #[diagnostic(
        code(flync::load::root_not_found),
        help("Pass the directory that contains `system_metadata.flync.yaml`")
    )]
    RootNotFound { path: PathBuf },

    #[error("mandatory directory not found: {}", .path.display())]
    #[diagnostic(
        code(flync::load::directory_not_found),
        help("Every workspace needs `ecus/` and every ECU needs a `controllers/` directory")
    )]
    DirectoryNotFound { path: PathBuf },

    #[error("workspace name mismatch: expected `{expected}`, workspace declares `{found}`")]
    #[diagnostic(code(flync::load::name_mismatch))]
    NameMismatch { expected: String, found: String },

    #[error("failed to read directory {}", .path.display())]
    #[diagnostic(code(flync::load::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Whether the load failed because a path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LoadError::RootNotFound { .. } | LoadError::DirectoryNotFound { .. }
        )
    }
}

/// Render a list of diagnostics as one numbered report.
pub fn render_report(diagnostics: &[Diagnostic], color: bool) -> String {
    let mut output = String::new();
    for (i, diag) in diagnostics.iter().enumerate() {
        output.push_str(&format!("{:>3}. {}", i + 1, diag.format(color)));
    }
    output
}
