//! Umbrella crate for the workspace integration tests

pub use orbit_core::*;
