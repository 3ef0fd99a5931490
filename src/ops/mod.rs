//! High-level operations.

pub mod load;

pub use load::{load, LoadState, Loader};
