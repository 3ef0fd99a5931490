//! Typed construction of workspace objects from parsed documents.

pub mod discriminator;
pub mod document;
pub mod reader;

pub use discriminator::{Discriminator, Variant};
pub use document::{build_document, build_entry, BuiltDocument};
pub use reader::{BuildErrors, FromNode, MapReader};
