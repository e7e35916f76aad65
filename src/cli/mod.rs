//! CLI module for testlane.
//!
//! ## Commands
//!
//! - `run [CATEGORY] [MODULE]` - resolve lanes, gate on compliance, dispatch
//! - `lint` - validate test organization without running anything
//! - `list` - print the catalog
//! - `status` - print catalog and violation counts
//! - `docs [TOPIC]` - resolve a documentation topic for the external renderer
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.
//!
//! ## Exit codes
//!
//! - 0 - success
//! - 1 - test or lint failure
//! - 2 - execution error, timeout, or cancellation
//! - 3 - catalog, filesystem, or configuration error

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::gate::EnforcementMode;
use crate::version::TESTLANE_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// Test or lint failure.
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Execution error, timeout, or cancellation.
    pub const EXECUTION: ExitCode = ExitCode(2);
    /// Catalog, filesystem, or configuration error.
    pub const CATALOG: ExitCode = ExitCode(3);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Output mode: human-oriented plain text or one JSON object per event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum View {
    #[default]
    Pretty,
    Data,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            View::Pretty => "pretty",
            View::Data => "data",
        })
    }
}

/// Test-lane discovery, validation, and execution engine
#[derive(Parser, Debug)]
#[command(name = "testlane")]
#[command(version = TESTLANE_VERSION)]
#[command(about = "Test-lane discovery, validation, and execution engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Test-tree root (overrides TESTLANE_ROOT and the configured default)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Output mode
    #[arg(long, global = true, value_enum, default_value_t = View::Pretty)]
    pub view: View,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve lanes, gate on compliance, and dispatch the external tool
    Run {
        /// Category name, legacy flat lane token (uat-math), or profile alias
        #[arg(value_name = "CATEGORY")]
        category: Option<String>,
        /// Module name
        #[arg(value_name = "MODULE")]
        module: Option<String>,
        /// Run despite blocking violations (reported as warnings)
        #[arg(long = "override", conflicts_with = "skip_enforcement")]
        override_enforcement: bool,
        /// Skip compliance checking entirely
        #[arg(long)]
        skip_enforcement: bool,
        /// Per-lane timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Validate test organization without running anything
    Lint {
        /// Show the detailed violation report
        #[arg(long)]
        violations: bool,
        /// Exit zero despite blocking violations
        #[arg(long = "override", conflicts_with = "skip_enforcement")]
        override_enforcement: bool,
        /// Skip compliance checking entirely
        #[arg(long)]
        skip_enforcement: bool,
    },

    /// Print the catalog without executing anything
    List {
        /// Only adhoc artifacts
        #[arg(long)]
        adhoc: bool,
    },

    /// Print catalog and violation counts without executing
    Status,

    /// Resolve a documentation topic for the external renderer
    Docs {
        #[arg(value_name = "TOPIC")]
        topic: Option<String>,
    },
}

/// Map the enforcement flags to a mode. Strict is the default.
fn enforcement_mode(override_enforcement: bool, skip_enforcement: bool) -> EnforcementMode {
    if skip_enforcement {
        EnforcementMode::Skip
    } else if override_enforcement {
        EnforcementMode::Override
    } else {
        EnforcementMode::Strict
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let globals = commands::Globals {
        root: cli.root,
        view: cli.view,
        verbose: cli.verbose,
    };

    // Bare `testlane` runs everything, matching the historical runner.
    match cli.command {
        Some(Command::Run {
            category,
            module,
            override_enforcement,
            skip_enforcement,
            timeout,
        }) => commands::run(
            &globals,
            category.as_deref(),
            module.as_deref(),
            enforcement_mode(override_enforcement, skip_enforcement),
            timeout,
        ),
        Some(Command::Lint {
            violations,
            override_enforcement,
            skip_enforcement,
        }) => commands::lint(
            &globals,
            violations,
            enforcement_mode(override_enforcement, skip_enforcement),
        ),
        Some(Command::List { adhoc }) => commands::list(&globals, adhoc),
        Some(Command::Status) => commands::status(&globals),
        Some(Command::Docs { topic }) => commands::docs(&globals, topic.as_deref()),
        None => commands::run(&globals, None, None, EnforcementMode::Strict, None),
    }
}

// ============================================================================
// Tests
// ============================================================================
