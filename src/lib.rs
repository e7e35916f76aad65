#![forbid(unsafe_code)]
//! testlane — test-lane discovery, validation, and execution engine
//!
//! testlane walks a structured test tree, validates its organization against
//! the lane naming rules, resolves (category, module) filters into runnable
//! lanes, dispatches each lane to an external test-execution tool, and
//! aggregates per-lane outcomes into a run summary.
//!
//! ## Pipeline
//!
//! One invocation runs the stages in strict order with no overlap:
//! catalog → lint → gate → lanes → exec → report. Only the exec stage blocks
//! for non-trivial wall-clock time (it waits on the external tool).
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`.
//!   The `cli` module enforces `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents a tool bug (logic error), use
//!   `.expect("INVARIANT: reason")` with a clear explanation.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod exec;
pub mod gate;
pub mod lanes;
pub mod lint;
pub mod report;
pub mod version;

pub use catalog::naming::Category;
pub use catalog::{Catalog, CatalogError, FileKind, TestArtifact};
pub use config::RunConfig;
pub use exec::invoker::{ProcessToolInvoker, ToolInvoker};
pub use exec::{CancelFlag, Dispatcher, LaneOutcome, LaneResult};
pub use gate::{EnforcementMode, GateDecision};
pub use lanes::{LaneError, LaneFilter, LaneSpec};
pub use lint::{Severity, Violation};
pub use report::{ConsoleReporter, Reporter, ResultAggregator, RunSummary};
