//! Version information.
//!
//! This module exposes the tool version as a single constant so all subsystems
//! (CLI banner, data output, summaries) agree on the same value.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer this constant over repeating `env!("CARGO_PKG_VERSION")` in multiple places.

/// The testlane version string (for example, `0.1.0-alpha.1`).
pub const TESTLANE_VERSION: &str = env!("CARGO_PKG_VERSION");
