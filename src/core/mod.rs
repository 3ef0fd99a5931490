//! Core data structures.
//!
//! - The directory contract a workspace follows
//! - Entity identity, locations and the name registry
//! - The typed object model
//! - The loaded [`Workspace`]

pub mod contract;
pub mod entity;
pub mod location;
pub mod model;
pub mod reference;
pub mod registry;
pub mod workspace;

pub use contract::{Contract, DocumentKind};
pub use entity::{EntityKey, EntityKind};
pub use location::{FieldPath, Location};
pub use model::{Entity, EntityRecord};
pub use reference::{RefKey, Reference};
pub use registry::NameRegistry;
pub use workspace::Workspace;
