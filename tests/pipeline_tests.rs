//! End-to-end pipeline tests: catalog → lint → gate → lanes → exec → report,
//! driven through the library API against throwaway test trees.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use testlane::catalog::{Catalog, ScanOptions};
use testlane::exec::invoker::{InvokeError, ToolInvoker, ToolOutput, ToolRequest};
use testlane::exec::{CancelFlag, DispatchEnd, Dispatcher, LaneOutcome, LaneResult};
use testlane::gate::{self, EnforcementMode};
use testlane::lanes::{self, LaneError, LaneFilter, LaneSpec};
use testlane::lint::{self, LintOptions};
use testlane::report::{NullReporter, Reporter, ResultAggregator, RunSummary};
use testlane::Category;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "// test\n").unwrap();
}

fn scan(root: &Path) -> Catalog {
    Catalog::scan(root, &ScanOptions::default()).unwrap()
}

/// Scripted invoker that also counts invocations, for asserting that gated or
/// unresolvable runs never reach the external tool.
struct CountingInvoker {
    script: BTreeMap<String, Result<i32, &'static str>>,
    calls: RefCell<Vec<String>>,
}

impl CountingInvoker {
    fn new(entries: &[(&str, Result<i32, &'static str>)]) -> Self {
        Self {
            script: entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ToolInvoker for CountingInvoker {
    fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, InvokeError> {
        self.calls.borrow_mut().push(request.lane_id.clone());
        match self.script.get(&request.lane_id) {
            Some(Ok(exit_code)) => Ok(ToolOutput {
                exit_code: *exit_code,
                output: format!("lane {} done", request.lane_id),
                duration: Duration::from_millis(3),
            }),
            Some(Err("timeout")) => Err(InvokeError::Timeout {
                timeout: request.timeout,
                output: "hung".to_string(),
            }),
            _ => Err(InvokeError::Spawn {
                tool: "scripted".to_string(),
                source: std::io::Error::other("unscripted lane"),
            }),
        }
    }
}

fn dispatch_all(
    invoker: &CountingInvoker,
    lanes: &[LaneSpec],
    cancel: CancelFlag,
) -> (DispatchEnd, RunSummary) {
    let mut aggregator =
        ResultAggregator::new(lanes.iter().map(LaneSpec::lane_id).collect(), Vec::new());
    let dispatcher = Dispatcher::new(invoker, cancel, Duration::from_secs(5));
    let end = dispatcher.dispatch(lanes, &mut aggregator, &mut NullReporter);
    let summary = aggregator.finish();
    (end, summary)
}

// ============================================================================
// Scenario 1: compliant tree lints clean
// ============================================================================

#[test]
fn compliant_tree_gates_clean_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "sanity/strings.rs");
    touch(root, "sanity_strings.rs");
    touch(root, "uat/strings.rs");
    touch(root, "uat_strings.rs");

    let catalog = scan(root);
    let violations = lint::check(&catalog, &LintOptions::default());
    assert!(!lint::has_blocking(&violations));

    let decision = gate::evaluate(&violations, EnforcementMode::Strict);
    assert!(decision.allow);
}

// ============================================================================
// Scenario 2: missing uat blocks strict, override runs anyway
// ============================================================================

#[test]
fn missing_uat_blocks_strict_but_override_dispatches() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "sanity/strings.rs");

    let catalog = scan(root);
    let violations = lint::check(&catalog, &LintOptions::default());
    let blocking: Vec<_> = violations.iter().filter(|v| v.is_blocking()).collect();
    assert_eq!(blocking.len(), 1);
    assert_eq!(blocking[0].message, "module strings missing uat");

    // Strict: the gate refuses before any dispatch.
    let strict = gate::evaluate(&violations, EnforcementMode::Strict);
    assert!(!strict.allow);

    // Override: the gate allows, warns, and the lane runs.
    let override_decision = gate::evaluate(&violations, EnforcementMode::Override);
    assert!(override_decision.allow);
    assert!(override_decision
        .messages
        .iter()
        .any(|m| m.starts_with("override:")));

    let filter = LaneFilter {
        category: Some(Category::Sanity),
        module: Some("strings".to_string()),
    };
    let resolved = lanes::resolve(&catalog, &filter).unwrap();
    let invoker = CountingInvoker::new(&[("sanity-strings", Ok(0))]);
    let (end, summary) = dispatch_all(&invoker, &resolved, CancelFlag::new());

    assert_eq!(end, DispatchEnd::Completed);
    assert_eq!(invoker.calls(), vec!["sanity-strings"]);
    assert_eq!(summary.passed, 1);
}

// ============================================================================
// Scenario 3: unknown lane makes zero invocations
// ============================================================================

#[test]
fn unknown_lane_errors_before_any_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "uat/math.rs");

    let catalog = scan(root);
    let filter = LaneFilter {
        category: Some(Category::Uat),
        module: Some("nonexistentmodule".to_string()),
    };
    let err = lanes::resolve(&catalog, &filter).unwrap_err();
    assert!(matches!(err, LaneError::NoSuchLane { .. }));
    // Resolution failed, so there is nothing to dispatch: the external tool
    // is never reached on this path.
}

// ============================================================================
// Scenario 4: one hung lane, the rest still run
// ============================================================================

#[test]
fn timeout_in_one_lane_leaves_the_others_running() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "sanity/alpha.rs");
    touch(root, "sanity/beta.rs");
    touch(root, "sanity/gamma.rs");

    let catalog = scan(root);
    let filter = LaneFilter {
        category: Some(Category::Sanity),
        module: None,
    };
    let resolved = lanes::resolve(&catalog, &filter).unwrap();
    let ids: Vec<_> = resolved.iter().map(LaneSpec::lane_id).collect();
    assert_eq!(ids, vec!["sanity-alpha", "sanity-beta", "sanity-gamma"]);

    let invoker = CountingInvoker::new(&[
        ("sanity-alpha", Ok(0)),
        ("sanity-beta", Err("timeout")),
        ("sanity-gamma", Ok(0)),
    ]);
    let (end, summary) = dispatch_all(&invoker, &resolved, CancelFlag::new());

    assert_eq!(end, DispatchEnd::Completed);
    assert_eq!(invoker.calls().len(), 3);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.errored, 1);
    // An errored lane means the run's exit code reflects an execution error.
    assert!(!summary.all_passed());
}

// ============================================================================
// Cancellation between lanes
// ============================================================================

/// Reporter that raises the cancel flag as soon as the first lane completes.
struct CancelAfterFirst {
    cancel: CancelFlag,
}

impl Reporter for CancelAfterFirst {
    fn on_lane_complete(&mut self, _result: &LaneResult) {
        self.cancel.cancel();
    }
    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

#[test]
fn cancellation_stops_between_lanes_and_keeps_partial_summary() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "sanity/alpha.rs");
    touch(root, "sanity/beta.rs");

    let catalog = scan(root);
    let resolved = lanes::resolve(
        &catalog,
        &LaneFilter {
            category: Some(Category::Sanity),
            module: None,
        },
    )
    .unwrap();

    let invoker = CountingInvoker::new(&[("sanity-alpha", Ok(0)), ("sanity-beta", Ok(0))]);
    let cancel = CancelFlag::new();
    let mut reporter = CancelAfterFirst {
        cancel: cancel.clone(),
    };
    let mut aggregator =
        ResultAggregator::new(resolved.iter().map(LaneSpec::lane_id).collect(), Vec::new());
    let dispatcher = Dispatcher::new(&invoker, cancel, Duration::from_secs(5));

    let end = dispatcher.dispatch(&resolved, &mut aggregator, &mut reporter);
    assert_eq!(end, DispatchEnd::Cancelled);
    assert_eq!(invoker.calls(), vec!["sanity-alpha"]);

    // The partial summary still reflects the completed lane.
    let summary = aggregator.finish();
    assert_eq!(summary.completed_lanes, 1);
    assert_eq!(summary.total_lanes, 2);
    assert_eq!(summary.passed, 1);
}

// ============================================================================
// Outcome mix drives the final counts
// ============================================================================

#[test]
fn summary_counts_distinguish_fail_from_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "smoke/a.rs");
    touch(root, "smoke/b.rs");
    touch(root, "smoke/c.rs");

    let catalog = scan(root);
    let resolved = lanes::resolve(
        &catalog,
        &LaneFilter {
            category: Some(Category::Smoke),
            module: None,
        },
    )
    .unwrap();

    // a passes, b fails (tool started, non-zero), c cannot start at all.
    let invoker = CountingInvoker::new(&[("smoke-a", Ok(0)), ("smoke-b", Ok(1))]);
    let (_, summary) = dispatch_all(&invoker, &resolved, CancelFlag::new());

    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errored, 1);
}

// ============================================================================
// Real process dispatch (unix)
// ============================================================================

#[cfg(unix)]
#[test]
fn process_invoker_runs_a_real_tool_per_lane() {
    use testlane::exec::invoker::ProcessToolInvoker;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "sanity/ok.rs");
    touch(root, "sanity/bad.rs");

    let catalog = scan(root);
    let resolved = lanes::resolve(
        &catalog,
        &LaneFilter {
            category: Some(Category::Sanity),
            module: None,
        },
    )
    .unwrap();

    // The fake external tool fails exactly for the `bad` lane scope.
    let invoker = ProcessToolInvoker::new(
        vec![
            "sh".to_string(),
            "-c".to_string(),
            "case {scope} in *bad*) echo failing; exit 1;; *) echo passing;; esac".to_string(),
        ],
        root.to_path_buf(),
    );

    let mut aggregator =
        ResultAggregator::new(resolved.iter().map(LaneSpec::lane_id).collect(), Vec::new());
    let dispatcher = Dispatcher::new(&invoker, CancelFlag::new(), Duration::from_secs(30));
    let end = dispatcher.dispatch(&resolved, &mut aggregator, &mut NullReporter);

    assert_eq!(end, DispatchEnd::Completed);
    let results = aggregator.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].lane_id(), "sanity-bad");
    assert_eq!(results[0].outcome, LaneOutcome::Fail);
    assert!(results[0].output.contains("failing"));
    assert_eq!(results[1].lane_id(), "sanity-ok");
    assert_eq!(results[1].outcome, LaneOutcome::Pass);
    assert!(results[1].output.contains("passing"));
}
