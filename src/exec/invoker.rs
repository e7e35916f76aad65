//! External tool invocation boundary.
//!
//! The actual test runner (for Rust trees, `cargo test`) is an external
//! collaborator. The core hands it a lane identifier, the lane's artifact
//! paths, and a timeout, and gets back an exit code, the combined output
//! text, and the duration — nothing in the output is parsed, only captured.
//!
//! The [`ToolInvoker`] trait keeps that boundary mockable; the
//! [`ProcessToolInvoker`] default implementation spawns the configured argv
//! with piped output and enforces the timeout by polling and killing.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Default external tool argv. `{scope}` expands to the lane's wrapper stem.
pub const DEFAULT_TOOL_ARGV: &[&str] = &["cargo", "test", "--test", "{scope}"];

/// How often the invoker polls a running child against its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Invocation failures, all distinct from a lane merely failing (a started
/// tool returning non-zero exits through [`ToolOutput`], not here).
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to start external tool `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("external tool exceeded the {}s timeout", timeout.as_secs())]
    Timeout {
        timeout: Duration,
        /// Output captured before the kill.
        output: String,
    },

    #[error("external tool terminated without an exit status")]
    Crashed { output: String },

    #[error("I/O error while running the external tool: {0}")]
    Io(#[from] std::io::Error),
}

/// One invocation request: a lane and its scope.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// Flat lane id (`uat-math`), for logging and template expansion.
    pub lane_id: String,
    /// Wrapper stem the tool is scoped to (`uat_math`).
    pub scope_stem: String,
    /// The lane's artifact paths, in catalog order, relative to the tree root.
    pub artifact_paths: Vec<PathBuf>,
    pub timeout: Duration,
}

/// What a completed invocation produced.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr, captured verbatim.
    pub output: String,
    pub duration: Duration,
}

/// The execution boundary. Implementations must block until the tool
/// terminates or the timeout elapses.
pub trait ToolInvoker {
    fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, InvokeError>;
}

// ============================================================================
// Process-backed implementation
// ============================================================================

/// Spawns the configured argv once per request.
///
/// Argv placeholders: `{scope}` → wrapper stem, `{lane}` → flat lane id,
/// `{paths}` → one argument per artifact path.
pub struct ProcessToolInvoker {
    argv: Vec<String>,
    workdir: PathBuf,
}

impl ProcessToolInvoker {
    pub fn new(argv: Vec<String>, workdir: PathBuf) -> Self {
        Self { argv, workdir }
    }

    /// The default `cargo test --test {scope}` invoker.
    pub fn default_for(workdir: PathBuf) -> Self {
        Self::new(
            DEFAULT_TOOL_ARGV.iter().map(|s| s.to_string()).collect(),
            workdir,
        )
    }

    fn expand_argv(&self, request: &ToolRequest) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.argv.len());
        for arg in &self.argv {
            if arg == "{paths}" {
                argv.extend(
                    request
                        .artifact_paths
                        .iter()
                        .map(|p| p.display().to_string()),
                );
            } else {
                argv.push(
                    arg.replace("{scope}", &request.scope_stem)
                        .replace("{lane}", &request.lane_id),
                );
            }
        }
        argv
    }
}

impl ToolInvoker for ProcessToolInvoker {
    fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, InvokeError> {
        let argv = self.expand_argv(request);
        let Some((program, args)) = argv.split_first() else {
            return Err(InvokeError::Spawn {
                tool: String::new(),
                source: std::io::Error::other("empty tool argv"),
            });
        };

        debug!(lane = %request.lane_id, tool = %argv.join(" "), "invoking external tool");
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                tool: program.clone(),
                source,
            })?;

        // Drain both pipes on background threads so a chatty tool can never
        // deadlock against a full pipe buffer while we poll for exit.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_thread = thread::spawn(move || drain(stdout));
        let stderr_thread = thread::spawn(move || drain(stderr));

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= request.timeout {
                warn!(lane = %request.lane_id, "tool exceeded timeout, killing");
                let _ = child.kill();
                let _ = child.wait();
                let output = join_output(stdout_thread, stderr_thread);
                return Err(InvokeError::Timeout {
                    timeout: request.timeout,
                    output,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let duration = start.elapsed();
        let output = join_output(stdout_thread, stderr_thread);

        match status.code() {
            Some(exit_code) => Ok(ToolOutput {
                exit_code,
                output,
                duration,
            }),
            // Killed by a signal outside our control.
            None => Err(InvokeError::Crashed { output }),
        }
    }
}

fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

fn join_output(
    stdout: thread::JoinHandle<Vec<u8>>,
    stderr: thread::JoinHandle<Vec<u8>>,
) -> String {
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    let mut output = String::from_utf8_lossy(&stdout).into_owned();
    if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&String::from_utf8_lossy(&stderr));
    }
    output
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(timeout_secs: u64) -> ToolRequest {
        ToolRequest {
            lane_id: "sanity-strings".to_string(),
            scope_stem: "sanity_strings".to_string(),
            artifact_paths: vec![PathBuf::from("sanity/strings.rs")],
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[test]
    fn expands_placeholders() {
        let invoker = ProcessToolInvoker::new(
            vec![
                "runner".to_string(),
                "{scope}".to_string(),
                "--lane".to_string(),
                "{lane}".to_string(),
                "{paths}".to_string(),
            ],
            PathBuf::from("."),
        );
        let argv = invoker.expand_argv(&request(5));
        assert_eq!(
            argv,
            vec!["runner", "sanity_strings", "--lane", "sanity-strings", "sanity/strings.rs"]
        );
    }

    #[test]
    fn spawn_failure_is_distinct_from_nonzero_exit() {
        let invoker = ProcessToolInvoker::new(
            vec!["testlane-no-such-tool-xyzzy".to_string()],
            PathBuf::from("."),
        );
        let err = invoker.invoke(&request(5)).unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn captures_exit_code_and_output() {
        let invoker = ProcessToolInvoker::new(
            vec!["sh".to_string(), "-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            PathBuf::from("."),
        );
        let out = invoker.invoke(&request(10)).unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[cfg(unix)]
    #[test]
    fn kills_on_timeout() {
        let invoker = ProcessToolInvoker::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 30".to_string()],
            PathBuf::from("."),
        );
        let start = Instant::now();
        let err = invoker.invoke(&request(1)).unwrap_err();
        assert!(matches!(err, InvokeError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
