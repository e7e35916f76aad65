//! Result aggregation and rendering.
//!
//! The aggregator accumulates [`LaneResult`]s in arrival order and produces
//! the run summary. Arrival order is a contract: results must match the
//! resolved lane order exactly, and an out-of-order record is rejected rather
//! than silently reordered.
//!
//! Rendering sits behind the [`Reporter`] trait. The console reporter is the
//! documented plain-text fallback (one line per lane result, one summary
//! line); enhanced ceremony rendering is an external collaborator's concern.
//! The data reporter emits one JSON object per event for machine consumers.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::exec::{LaneOutcome, LaneResult};
use crate::lint::Violation;
use crate::version::TESTLANE_VERSION;

// ============================================================================
// Summary
// ============================================================================

/// Terminal artifact of one invocation. Not persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_lanes: usize,
    pub completed_lanes: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Violations the run encountered, in lint order.
    pub violations: Vec<Violation>,
    pub wall_clock_ms: u64,
}

impl RunSummary {
    /// Whether every dispatched lane passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.completed_lanes == self.total_lanes
    }
}

/// Out-of-order or surplus completions are contract violations, not data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("lane completed out of order: expected `{expected}`, got `{got}`")]
    OutOfOrder { expected: String, got: String },

    #[error("unexpected lane completion `{got}`: all {total} lanes already recorded")]
    Surplus { got: String, total: usize },
}

// ============================================================================
// Aggregator
// ============================================================================

/// Accumulates lane results for one run.
///
/// The summary may be queried at any point and reflects only the lanes
/// completed so far; after [`ResultAggregator::finish`] the summary is frozen
/// and identical on every subsequent read.
pub struct ResultAggregator {
    expected: Vec<String>,
    results: Vec<LaneResult>,
    violations: Vec<Violation>,
    started: Instant,
    frozen: Option<RunSummary>,
}

impl ResultAggregator {
    /// `expected` is the resolved lane-id sequence, in dispatch order.
    pub fn new(expected: Vec<String>, violations: Vec<Violation>) -> Self {
        Self {
            expected,
            results: Vec::new(),
            violations,
            started: Instant::now(),
            frozen: None,
        }
    }

    /// Record the next completed lane. Rejects completions that do not match
    /// the expected order.
    pub fn record(&mut self, result: LaneResult) -> Result<(), AggregateError> {
        let got = result.lane_id();
        match self.expected.get(self.results.len()) {
            Some(expected) if *expected == got => {
                self.results.push(result);
                Ok(())
            }
            Some(expected) => Err(AggregateError::OutOfOrder {
                expected: expected.clone(),
                got,
            }),
            None => Err(AggregateError::Surplus {
                got,
                total: self.expected.len(),
            }),
        }
    }

    /// Results recorded so far, in arrival order.
    pub fn results(&self) -> &[LaneResult] {
        &self.results
    }

    /// A summary of the lanes completed so far. Before `finish` the wall
    /// clock is live; afterwards the frozen summary is returned unchanged.
    pub fn snapshot(&self) -> RunSummary {
        if let Some(frozen) = &self.frozen {
            return frozen.clone();
        }
        self.build(self.started.elapsed().as_millis() as u64)
    }

    /// Freeze and return the final summary. Idempotent.
    pub fn finish(&mut self) -> RunSummary {
        if self.frozen.is_none() {
            self.frozen = Some(self.build(self.started.elapsed().as_millis() as u64));
        }
        self.snapshot()
    }

    fn build(&self, wall_clock_ms: u64) -> RunSummary {
        let count = |outcome: LaneOutcome| {
            self.results.iter().filter(|r| r.outcome == outcome).count()
        };
        RunSummary {
            total_lanes: self.expected.len(),
            completed_lanes: self.results.len(),
            passed: count(LaneOutcome::Pass),
            failed: count(LaneOutcome::Fail),
            errored: count(LaneOutcome::Error),
            violations: self.violations.clone(),
            wall_clock_ms,
        }
    }
}

// ============================================================================
// Reporters
// ============================================================================

/// Rendering boundary. Implement to customize output (ceremony, JSON, TAP).
pub trait Reporter {
    fn on_run_start(&mut self, _total_lanes: usize) {}

    /// Called once per lane, in completion order.
    fn on_lane_complete(&mut self, result: &LaneResult);

    /// Called once with the final (possibly partial, when cancelled) summary.
    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Discards everything. Used where only the aggregate matters.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_lane_complete(&mut self, _result: &LaneResult) {}
    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

/// Plain-text fallback reporter: one line per lane, one summary line.
pub struct ConsoleReporter {
    pub verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn on_run_start(&mut self, total_lanes: usize) {
        println!("running {total_lanes} lane(s)");
    }

    fn on_lane_complete(&mut self, result: &LaneResult) {
        println!("{}", render_lane_line(result));
        // Failure detail goes to stderr so stdout stays one line per lane.
        if self.verbose || result.outcome != LaneOutcome::Pass {
            for line in result.output.lines() {
                eprintln!("    {line}");
            }
        }
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        println!("{}", render_summary_line(summary));
    }
}

/// Machine-readable reporter: one JSON object per event on stdout.
pub struct DataReporter;

impl Reporter for DataReporter {
    fn on_run_start(&mut self, total_lanes: usize) {
        println!(
            "{}",
            serde_json::json!({
                "event": "run-start",
                "version": TESTLANE_VERSION,
                "total_lanes": total_lanes,
            })
        );
    }

    fn on_lane_complete(&mut self, result: &LaneResult) {
        println!(
            "{}",
            serde_json::json!({
                "event": "lane",
                "lane": result.lane_id(),
                "result": result,
            })
        );
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        println!(
            "{}",
            serde_json::json!({
                "event": "summary",
                "summary": summary,
            })
        );
    }
}

/// One line per lane result, the documented fallback contract.
pub fn render_lane_line(result: &LaneResult) -> String {
    let status = match (result.outcome, result.reason) {
        (LaneOutcome::Pass, _) => "PASS".to_string(),
        (LaneOutcome::Fail, _) => "FAIL".to_string(),
        (LaneOutcome::Error, Some(reason)) => format!("ERROR ({reason})"),
        (LaneOutcome::Error, None) => "ERROR".to_string(),
    };
    format!("{} {} ({}ms)", result.lane_id(), status, result.duration_ms)
}

/// The single summary line closing every run.
pub fn render_summary_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "{}/{} lane(s): {} passed, {} failed, {} errored in {:.2}s",
        summary.completed_lanes,
        summary.total_lanes,
        summary.passed,
        summary.failed,
        summary.errored,
        summary.wall_clock_ms as f64 / 1000.0
    );
    if !summary.violations.is_empty() {
        let blocking = summary.violations.iter().filter(|v| v.is_blocking()).count();
        line.push_str(&format!(
            " ({} violation(s), {} blocking)",
            summary.violations.len(),
            blocking
        ));
    }
    line
}

// ============================================================================
// Tests
// ============================================================================
