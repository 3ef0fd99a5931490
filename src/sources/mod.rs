//! Document sources.
//!
//! The index decides which documents a workspace is made of; the parser turns each
//! one into a generic tree for the typed builder.

pub mod index;
pub mod parser;

pub use index::{DocumentIndex, DocumentStatus, Finding, IndexEntry};
pub use parser::{read_document, DocumentParser, ParseError, RawNode, YamlParser};
