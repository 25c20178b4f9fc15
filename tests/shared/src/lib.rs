//! Shared testing utilities for the turul-peer workspace
//!
//! [`FixturePeer`] stands in for a remote peer: it serves a small canned catalogue
//! (two resources, an `add` tool, a `greeting` prompt) over an in-process connection.

pub mod fixtures;
pub mod harness;
pub mod peer;

// Re-export the main types for convenience
pub use fixtures::{CONFIG_URI, README_URI, TestFixtures, serve};
pub use harness::{TEST_TIMEOUT, connected_client, connected_client_with, fixture_builder, wait_for_state};
pub use peer::{FixtureConfig, FixturePeer};
