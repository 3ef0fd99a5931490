//! Document parsing - text to generic tree.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

use crate::core::location::Location;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

/// An untyped document body plus the path it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    /// Document path relative to the workspace root
    pub path: PathBuf,
    pub value: Value,
}

/// Failure to turn a document into a [`RawNode`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {message}", .path.display())]
    Syntax {
        path: PathBuf,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("duplicate key in {}: {message}", .path.display())]
    DuplicateKey {
        path: PathBuf,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },
}

impl ParseError {
    /// Convert to a user-facing diagnostic anchored at the document.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::Read { path, source } => {
                Diagnostic::error(DiagnosticKind::ReadError, "document could not be read")
                    .at(Location::document(path))
                    .with_context("reason", source.to_string())
            }
            ParseError::Syntax {
                path,
                message,
                line,
                column,
            } => with_position(
                Diagnostic::error(DiagnosticKind::ParseError, message.clone())
                    .at(Location::document(path)),
                *line,
                *column,
            ),
            ParseError::DuplicateKey {
                path,
                message,
                line,
                column,
            } => with_position(
                Diagnostic::error(DiagnosticKind::DuplicateKey, format!("duplicate key: {}", message))
                    .at(Location::document(path))
                    .with_suggestion("help: Each key may appear only once per mapping"),
                *line,
                *column,
            ),
        }
    }
}

fn with_position(diag: Diagnostic, line: Option<usize>, column: Option<usize>) -> Diagnostic {
    match (line, column) {
        (Some(line), Some(column)) => diag
            .with_context("line", line.to_string())
            .with_context("column", column.to_string()),
        _ => diag,
    }
}

/// Turns document text into a generic tree.
pub trait DocumentParser: Send + Sync {
    /// Parse `content`; `path` is only used to label the result.
    fn parse(&self, content: &str, path: &Path) -> Result<RawNode, ParseError>;
}

/// The YAML parser every workspace document goes through.
///
/// Repeated keys in one mapping are rejected rather than silently overwritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl DocumentParser for YamlParser {
    fn parse(&self, content: &str, path: &Path) -> Result<RawNode, ParseError> {
        match serde_yaml::from_str::<Value>(content) {
            Ok(value) => Ok(RawNode {
                path: path.to_path_buf(),
                value,
            }),
            Err(err) => {
                let (line, column) = match err.location() {
                    Some(loc) => (Some(loc.line()), Some(loc.column())),
                    None => (None, None),
                };
                let message = err.to_string();
                if message.contains("duplicate entry") {
                    Err(ParseError::DuplicateKey {
                        path: path.to_path_buf(),
                        message,
                        line,
                        column,
                    })
                } else {
                    Err(ParseError::Syntax {
                        path: path.to_path_buf(),
                        message,
                        line,
                        column,
                    })
                }
            }
        }
    }
}

/// Read a document from disk and parse it.
///
/// `absolute` is read; `relative` labels the node and any error.
pub fn read_document(
    parser: &dyn DocumentParser,
    absolute: &Path,
    relative: &Path,
) -> Result<RawNode, ParseError> {
    let content = std::fs::read_to_string(absolute).map_err(|source| ParseError::Read {
        path: relative.to_path_buf(),
        source,
    })?;
    parser.parse(&content, relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_mapping() {
        let node = YamlParser
            .parse("name: eth_ecu_controller1\ninterfaces: []\n", Path::new("c.flync.yaml"))
            .unwrap();
        assert_eq!(node.path, PathBuf::from("c.flync.yaml"));
        assert_eq!(
            node.value.get("name").and_then(Value::as_str),
            Some("eth_ecu_controller1")
        );
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let err = YamlParser
            .parse("name: a\nname: b\n", Path::new("c.flync.yaml"))
            .unwrap_err();
        assert!(matches!(err, ParseError::DuplicateKey { .. }));

        let diag = err.to_diagnostic();
        assert_eq!(diag.kind, DiagnosticKind::DuplicateKey);
        assert!(diag.message.contains("duplicate key"));
        assert_eq!(diag.location.to_string(), "c.flync.yaml");
    }

    #[test]
    fn test_syntax_error_carries_position() {
        let err = YamlParser
            .parse("name: [unclosed\n", Path::new("bad.flync.yaml"))
            .unwrap_err();
        let diag = err.to_diagnostic();
        assert_eq!(diag.kind, DiagnosticKind::ParseError);
        assert!(diag.context.iter().any(|(k, _)| k == "line"));
    }

    #[test]
    fn test_read_document_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = read_document(
            &YamlParser,
            &tmp.path().join("nope.flync.yaml"),
            Path::new("nope.flync.yaml"),
        )
        .unwrap_err();
        assert_eq!(err.to_diagnostic().kind, DiagnosticKind::ReadError);
    }
}
