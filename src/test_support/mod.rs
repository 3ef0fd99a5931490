//! Test utilities for unit tests.
//!
//! Loader tests work on a private copy of the example workspace under
//! `tests/fixtures`, so each test can break documents without affecting others.
//!
//! ```rust,ignore
//! let (_tmp, root) = example_workspace();
//! replace_in(&root.join("ecus/eth_ecu/ports.flync.yaml"), "eth_port1", "ETH_PORT1");
//! let ws = load(EXAMPLE_NAME, &root).unwrap();
//! ```

pub mod fixtures;

pub use fixtures::*;
