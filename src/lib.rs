//! FLYNC - loader and validator for vehicle E/E network workspaces
//!
//! A workspace is a directory tree of `*.flync.yaml` documents describing ECUs, their
//! ports, controllers, switches, topology and SOME/IP services. This crate indexes
//! the tree against the directory contract, builds typed objects from every document,
//! resolves the names and ids documents use to point at each other, and reports every
//! problem it finds with a precise location.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Fixture helpers for unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{
    entity::{EntityKey, EntityKind},
    location::{FieldPath, Location},
    workspace::Workspace,
};
pub use ops::{load, LoadState, Loader};
pub use resolver::DependencyGraph;
pub use util::diagnostic::{Diagnostic, DiagnosticKind, LoadError, Severity};
