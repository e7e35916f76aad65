//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.
//!
//! The pipeline order is fixed: catalog → lint → gate → lanes → exec →
//! report. A fatal catalog or configuration problem exits 3 before any other
//! stage; everything later degrades per lane and still ends with a printed
//! summary.

use std::env;
use std::path::PathBuf;

use crate::catalog::naming::Category;
use crate::catalog::{Catalog, CatalogError};
use crate::config::{EnvInputs, Overrides, RunConfig};
use crate::exec::invoker::ProcessToolInvoker;
use crate::exec::{CancelFlag, DispatchEnd, Dispatcher};
use crate::gate::{self, EnforcementMode};
use crate::lanes::{self, LaneSpec};
use crate::lint::{self, Violation};
use crate::report::{ConsoleReporter, DataReporter, Reporter, ResultAggregator, render_summary_line};

use super::{CliError, CliResult, ExitCode, View};

/// Global flags shared by every command.
pub struct Globals {
    pub root: Option<PathBuf>,
    pub view: View,
    pub verbose: bool,
}

/// Assembled configuration plus the scanned catalog.
struct Context {
    config: RunConfig,
    catalog: Catalog,
}

/// Build configuration and scan the tree. All failures here are exit 3.
fn load_context(
    globals: &Globals,
    enforcement: EnforcementMode,
    timeout: Option<u64>,
) -> CliResult<Context> {
    let cwd = env::current_dir()
        .map_err(|e| CliError::new(format!("testlane: cannot determine working directory: {e}"), ExitCode::CATALOG))?;

    let overrides = Overrides {
        root: globals.root.clone(),
        timeout_secs: timeout,
        enforcement,
        verbose: globals.verbose,
    };
    let config = RunConfig::assemble(&cwd, overrides, EnvInputs::from_process())
        .map_err(|e| CliError::new(format!("testlane: {e}"), ExitCode::CATALOG))?;

    let catalog = Catalog::scan(&config.tree_root, &config.scan_options())
        .map_err(|e: CatalogError| CliError::new(format!("testlane: {e}"), ExitCode::CATALOG))?;

    Ok(Context { config, catalog })
}

/// Lint the catalog unless enforcement is skipped entirely.
fn compute_violations(ctx: &Context) -> Vec<Violation> {
    match ctx.config.enforcement {
        EnforcementMode::Skip => Vec::new(),
        _ => lint::check(&ctx.catalog, &ctx.config.lint_options()),
    }
}

fn make_reporter(globals: &Globals) -> Box<dyn Reporter> {
    match globals.view {
        View::Pretty => Box::new(ConsoleReporter::new(globals.verbose)),
        View::Data => Box::new(DataReporter),
    }
}

// ============================================================================
// run
// ============================================================================

/// `run [CATEGORY] [MODULE]`: the full pipeline.
pub fn run(
    globals: &Globals,
    category: Option<&str>,
    module: Option<&str>,
    enforcement: EnforcementMode,
    timeout: Option<u64>,
) -> CliResult<ExitCode> {
    let ctx = load_context(globals, enforcement, timeout)?;

    let violations = compute_violations(&ctx);
    let decision = gate::evaluate(&violations, ctx.config.enforcement);
    for message in &decision.messages {
        eprintln!("{message}");
    }
    if !decision.allow {
        // The run still ends with a summary, even though nothing dispatched.
        let mut aggregator = ResultAggregator::new(Vec::new(), violations);
        println!("{}", render_summary_line(&aggregator.finish()));
        return Err(CliError::new("", ExitCode::FAILURE));
    }

    let filter = lanes::parse_filter(category, module, &ctx.config.profile.lane_aliases)
        .map_err(|e| CliError::failure(format!("testlane: {e}")))?;
    let resolved = lanes::resolve(&ctx.catalog, &filter)
        .map_err(|e| CliError::failure(format!("testlane: {e}")))?;

    let mut reporter = make_reporter(globals);
    reporter.on_run_start(resolved.len());

    let invoker = ProcessToolInvoker::new(
        ctx.config.tool_argv.clone(),
        ctx.config.repo_root.clone(),
    );
    let cancel = CancelFlag::new();
    let dispatcher = Dispatcher::new(&invoker, cancel, ctx.config.timeout);
    let mut aggregator = ResultAggregator::new(
        resolved.iter().map(LaneSpec::lane_id).collect(),
        violations,
    );

    let end = dispatcher.dispatch(&resolved, &mut aggregator, reporter.as_mut());

    let summary = aggregator.finish();
    reporter.on_run_complete(&summary);

    match end {
        DispatchEnd::Cancelled => Err(CliError::new("testlane: run cancelled", ExitCode::EXECUTION)),
        DispatchEnd::Completed if summary.errored > 0 => {
            Err(CliError::new("", ExitCode::EXECUTION))
        }
        DispatchEnd::Completed if summary.failed > 0 => Err(CliError::new("", ExitCode::FAILURE)),
        DispatchEnd::Completed => Ok(ExitCode::SUCCESS),
    }
}

// ============================================================================
// lint
// ============================================================================

/// `lint [--violations]`: report violations, exit 1 when blocking ones remain.
pub fn lint(
    globals: &Globals,
    detailed: bool,
    enforcement: EnforcementMode,
) -> CliResult<ExitCode> {
    let ctx = load_context(globals, enforcement, None)?;

    if ctx.config.enforcement == EnforcementMode::Skip {
        println!("enforcement skipped; no violations computed");
        return Ok(ExitCode::SUCCESS);
    }

    let violations = lint::check(&ctx.catalog, &ctx.config.lint_options());

    match globals.view {
        View::Data => {
            let payload = serde_json::to_string(&violations)
                .map_err(|e| CliError::failure(format!("testlane: {e}")))?;
            println!("{payload}");
        }
        View::Pretty if detailed => print!("{}", lint::render_report(&violations)),
        View::Pretty => {
            let blocking = violations.iter().filter(|v| v.is_blocking()).count();
            println!(
                "{} violation(s) ({} blocking) across {} artifact(s)",
                violations.len(),
                blocking,
                ctx.catalog.artifacts().len()
            );
            for (rule_id, count) in lint::summary_counts(&violations) {
                println!("  {rule_id}: {count}");
            }
        }
    }

    let decision = gate::evaluate(&violations, ctx.config.enforcement);
    if ctx.config.enforcement == EnforcementMode::Override {
        for message in &decision.messages {
            eprintln!("{message}");
        }
    }
    if decision.allow {
        Ok(ExitCode::SUCCESS)
    } else {
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

// ============================================================================
// list
// ============================================================================

/// `list [--adhoc]`: print the catalog without executing anything.
pub fn list(globals: &Globals, adhoc_only: bool) -> CliResult<ExitCode> {
    let ctx = load_context(globals, EnforcementMode::Strict, None)?;

    let artifacts: Vec<_> = ctx
        .catalog
        .artifacts()
        .iter()
        .filter(|a| !adhoc_only || a.category == Category::Adhoc)
        .collect();

    match globals.view {
        View::Data => {
            let payload = serde_json::to_string(&artifacts)
                .map_err(|e| CliError::failure(format!("testlane: {e}")))?;
            println!("{payload}");
        }
        View::Pretty => {
            for artifact in &artifacts {
                println!(
                    "{:<12} {:<20} {:<8} {}",
                    artifact.category,
                    artifact.module.as_deref().unwrap_or("(global)"),
                    format!("{:?}", artifact.kind).to_lowercase(),
                    artifact.rel_path.display()
                );
            }
            println!("{} artifact(s)", artifacts.len());
            if !adhoc_only && !ctx.catalog.unrecognized().is_empty() {
                println!("{} unrecognized entr(ies)", ctx.catalog.unrecognized().len());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// status
// ============================================================================

/// `status`: catalog and violation counts; exits like `lint`.
pub fn status(globals: &Globals) -> CliResult<ExitCode> {
    let ctx = load_context(globals, EnforcementMode::Strict, None)?;
    let violations = lint::check(&ctx.catalog, &ctx.config.lint_options());
    let blocking = violations.iter().filter(|v| v.is_blocking()).count();

    match globals.view {
        View::Data => {
            let payload = serde_json::json!({
                "tree_root": ctx.config.tree_root.display().to_string(),
                "artifacts": ctx.catalog.artifacts().len(),
                "modules": ctx.catalog.enforced_modules().len(),
                "categories": ctx.catalog.categories_present().len(),
                "unrecognized": ctx.catalog.unrecognized().len(),
                "violations": violations.len(),
                "blocking": blocking,
            });
            println!("{payload}");
        }
        View::Pretty => {
            println!("tree root:     {}", ctx.config.tree_root.display());
            if let Some(profile) = &ctx.config.profile_name {
                println!("profile:       {profile}");
            }
            println!("artifacts:     {}", ctx.catalog.artifacts().len());
            println!("modules:       {}", ctx.catalog.enforced_modules().len());
            println!("categories:    {}", ctx.catalog.categories_present().len());
            println!("unrecognized:  {}", ctx.catalog.unrecognized().len());
            println!("violations:    {} ({} blocking)", violations.len(), blocking);
        }
    }

    if blocking == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

// ============================================================================
// docs
// ============================================================================

/// `docs [TOPIC]`: resolve a topic path from the active profile overlay.
/// Rendering is the external documentation collaborator's job; the core only
/// reports where the topic lives.
pub fn docs(globals: &Globals, topic: Option<&str>) -> CliResult<ExitCode> {
    let ctx = load_context(globals, EnforcementMode::Strict, None)?;
    let doc_paths = &ctx.config.profile.doc_paths;

    match topic {
        None => {
            if doc_paths.is_empty() {
                println!("no documentation topics configured for this profile");
            } else {
                for (name, path) in doc_paths {
                    println!("{name:<20} {path}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(topic) => match doc_paths.get(topic) {
            Some(path) => {
                println!("{}", ctx.config.repo_root.join(path).display());
                Ok(ExitCode::SUCCESS)
            }
            None => Err(CliError::failure(format!(
                "testlane: unknown doc topic `{topic}`; known: {}",
                if doc_paths.is_empty() {
                    "(none)".to_string()
                } else {
                    doc_paths.keys().cloned().collect::<Vec<_>>().join(", ")
                }
            ))),
        },
    }
}
