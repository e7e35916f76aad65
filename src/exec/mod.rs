//! Lane dispatch.
//!
//! The dispatcher walks the resolved lanes strictly in input order and hands
//! each one to the external tool, one invocation in flight at a time. That
//! single-flight rule is an ordering guarantee the summary depends on, not a
//! performance measure.
//!
//! Per-lane failures never abort the run: a non-zero exit is a `fail`
//! outcome, a tool that could not start or died abnormally is an `error`
//! outcome, and a timeout is an `error` with reason `timeout`. A raised
//! cancel flag stops the run between lanes, leaving the partial results in
//! the aggregator.

pub mod invoker;

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::lanes::LaneSpec;
use crate::report::{Reporter, ResultAggregator};
use self::invoker::{InvokeError, ToolInvoker, ToolRequest};

// ============================================================================
// Lane results
// ============================================================================

/// Outcome of one dispatched lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneOutcome {
    /// The tool started and exited zero.
    Pass,
    /// The tool started and exited non-zero.
    Fail,
    /// The tool could not start, crashed abnormally, or timed out.
    Error,
}

/// One lane's execution record, consumed by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneResult {
    pub lane: LaneSpec,
    /// `None` when the tool never produced an exit status.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    /// Combined tool output, captured verbatim.
    pub output: String,
    pub outcome: LaneOutcome,
    /// Set for `error` outcomes: `timeout`, `spawn`, `crash`, or `io`.
    pub reason: Option<&'static str>,
}

impl LaneResult {
    pub fn lane_id(&self) -> String {
        self.lane.lane_id()
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cancellation flag, checked between lanes. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEnd {
    /// Every lane was dispatched.
    Completed,
    /// The cancel flag was raised; remaining lanes were never started.
    Cancelled,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Sequential dispatcher over one resolved lane set.
pub struct Dispatcher<'a> {
    invoker: &'a dyn ToolInvoker,
    cancel: CancelFlag,
    timeout: Duration,
    /// Guards the at-most-one-invocation contract.
    in_flight: Cell<bool>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(invoker: &'a dyn ToolInvoker, cancel: CancelFlag, timeout: Duration) -> Self {
        Self {
            invoker,
            cancel,
            timeout,
            in_flight: Cell::new(false),
        }
    }

    /// Dispatch every lane in input order, recording each result as it
    /// arrives. Returns whether the run completed or was cancelled.
    pub fn dispatch(
        &self,
        lanes: &[LaneSpec],
        aggregator: &mut ResultAggregator,
        reporter: &mut dyn Reporter,
    ) -> DispatchEnd {
        for lane in lanes {
            if self.cancel.is_cancelled() {
                warn!(lane = %lane.lane_id(), "cancelled before lane start");
                return DispatchEnd::Cancelled;
            }

            let result = self.run_lane(lane);
            reporter.on_lane_complete(&result);
            aggregator
                .record(result)
                .expect("INVARIANT: sequential dispatch completes lanes in input order");
        }
        DispatchEnd::Completed
    }

    fn run_lane(&self, lane: &LaneSpec) -> LaneResult {
        assert!(
            !self.in_flight.replace(true),
            "INVARIANT: at most one external invocation in flight per dispatcher"
        );

        let request = ToolRequest {
            lane_id: lane.lane_id(),
            scope_stem: lane.wrapper_stem(),
            artifact_paths: lane.artifacts.iter().map(|a| a.rel_path.clone()).collect(),
            timeout: self.timeout,
        };
        debug!(lane = %request.lane_id, artifacts = request.artifact_paths.len(), "dispatching lane");

        let result = match self.invoker.invoke(&request) {
            Ok(out) => LaneResult {
                lane: lane.clone(),
                exit_code: Some(out.exit_code),
                duration_ms: out.duration.as_millis() as u64,
                output: out.output,
                outcome: if out.exit_code == 0 {
                    LaneOutcome::Pass
                } else {
                    LaneOutcome::Fail
                },
                reason: None,
            },
            Err(InvokeError::Timeout { timeout, output }) => LaneResult {
                lane: lane.clone(),
                exit_code: None,
                duration_ms: timeout.as_millis() as u64,
                output,
                outcome: LaneOutcome::Error,
                reason: Some("timeout"),
            },
            Err(err @ InvokeError::Spawn { .. }) => LaneResult {
                lane: lane.clone(),
                exit_code: None,
                duration_ms: 0,
                output: err.to_string(),
                outcome: LaneOutcome::Error,
                reason: Some("spawn"),
            },
            Err(InvokeError::Crashed { output }) => LaneResult {
                lane: lane.clone(),
                exit_code: None,
                duration_ms: 0,
                output,
                outcome: LaneOutcome::Error,
                reason: Some("crash"),
            },
            Err(err @ InvokeError::Io(_)) => LaneResult {
                lane: lane.clone(),
                exit_code: None,
                duration_ms: 0,
                output: err.to_string(),
                outcome: LaneOutcome::Error,
                reason: Some("io"),
            },
        };

        self.in_flight.set(false);
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
