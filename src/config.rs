//! Invocation configuration.
//!
//! All knobs for one run live in an explicit [`RunConfig`] constructed once
//! at invocation start and passed into each component — there is no ambient
//! mutable state. Sources, highest precedence first:
//!
//! 1. CLI flags
//! 2. environment (`TESTLANE_ROOT`, `TESTLANE_PROFILE`)
//! 3. optional `.testlane.toml` at the repository root
//! 4. built-in defaults
//!
//! The repository root is found by walking up from the working directory
//! looking for `.git` or a project manifest; the test tree defaults to
//! `<repo_root>/tests`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::ScanOptions;
use crate::gate::EnforcementMode;
use crate::lint::LintOptions;

/// Environment variable overriding the test-tree root.
pub const ROOT_ENV: &str = "TESTLANE_ROOT";
/// Environment variable selecting a profile overlay.
pub const PROFILE_ENV: &str = "TESTLANE_PROFILE";

const CONFIG_FILE: &str = ".testlane.toml";
const DEFAULT_TEST_ROOT: &str = "tests";
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Manifest files that mark a repository root when `.git` is absent.
const ROOT_MARKERS: &[&str] = &["Cargo.toml", "pyproject.toml", "package.json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("not inside a repository: no .git or manifest found above {}", start.display())]
    NoRepoRoot { start: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("unknown profile `{name}`; known profiles: {}", if known.is_empty() { "(none)".to_string() } else { known.join(", ") })]
    UnknownProfile { name: String, known: Vec<String> },
}

// ============================================================================
// File config (.testlane.toml)
// ============================================================================

/// A named overlay: lane-name aliases and doc-topic paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub lane_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub doc_paths: BTreeMap<String, String>,
}

/// On-disk configuration. Every field is optional; defaults fill the rest.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    test_root: Option<String>,
    /// External tool argv template (`{scope}`, `{lane}`, `{paths}` expand).
    tool: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    allowed_root_entries: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    profiles: BTreeMap<String, ProfileConfig>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        Ok(Some(config))
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Flag-level overrides collected by the CLI layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub enforcement: EnforcementMode,
    pub verbose: bool,
}

/// Environment inputs, separated from `std::env` for testability.
#[derive(Debug, Clone, Default)]
pub struct EnvInputs {
    pub root: Option<String>,
    pub profile: Option<String>,
}

impl EnvInputs {
    /// Read the process environment.
    pub fn from_process() -> Self {
        Self {
            root: std::env::var(ROOT_ENV).ok().filter(|s| !s.is_empty()),
            profile: std::env::var(PROFILE_ENV).ok().filter(|s| !s.is_empty()),
        }
    }
}

/// The assembled, immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Repository root; the external tool runs from here.
    pub repo_root: PathBuf,
    /// The test tree handed to the catalog.
    pub tree_root: PathBuf,
    pub tool_argv: Vec<String>,
    pub timeout: Duration,
    pub enforcement: EnforcementMode,
    pub verbose: bool,
    pub allowed_root_entries: Vec<String>,
    pub exclude: Vec<String>,
    pub profile: ProfileConfig,
    pub profile_name: Option<String>,
}

impl RunConfig {
    /// Assemble the configuration for a run starting in `cwd`.
    pub fn assemble(
        cwd: &Path,
        overrides: Overrides,
        env: EnvInputs,
    ) -> Result<RunConfig, ConfigError> {
        let repo_root = find_repo_root(cwd);

        let explicit_root = overrides
            .root
            .clone()
            .or_else(|| env.root.as_ref().map(PathBuf::from));

        // Without an explicit tree root there must be a repository to anchor on.
        let repo_root = match (&repo_root, &explicit_root) {
            (Some(repo_root), _) => repo_root.clone(),
            (None, Some(_)) => cwd.to_path_buf(),
            (None, None) => {
                return Err(ConfigError::NoRepoRoot {
                    start: cwd.to_path_buf(),
                });
            }
        };

        let file = FileConfig::load(&repo_root.join(CONFIG_FILE))?.unwrap_or_default();
        debug!(repo_root = %repo_root.display(), "assembled configuration");

        let tree_root = match explicit_root {
            Some(root) if root.is_absolute() => root,
            Some(root) => cwd.join(root),
            None => repo_root.join(file.test_root.as_deref().unwrap_or(DEFAULT_TEST_ROOT)),
        };

        let (profile_name, profile) = match env.profile {
            None => (None, ProfileConfig::default()),
            Some(name) => match file.profiles.get(&name) {
                Some(profile) => (Some(name), profile.clone()),
                None => {
                    return Err(ConfigError::UnknownProfile {
                        name,
                        known: file.profiles.keys().cloned().collect(),
                    });
                }
            },
        };

        let mut exclude = ScanOptions::default().exclude;
        exclude.extend(file.exclude);

        Ok(RunConfig {
            repo_root,
            tree_root,
            tool_argv: file.tool.unwrap_or_else(|| {
                crate::exec::invoker::DEFAULT_TOOL_ARGV
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            timeout: Duration::from_secs(
                overrides
                    .timeout_secs
                    .or(file.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            enforcement: overrides.enforcement,
            verbose: overrides.verbose,
            allowed_root_entries: file.allowed_root_entries,
            exclude,
            profile,
            profile_name,
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            exclude: self.exclude.clone(),
        }
    }

    pub fn lint_options(&self) -> LintOptions {
        LintOptions {
            allowed_root_entries: self.allowed_root_entries.clone(),
        }
    }
}

/// Walk up from `start` looking for `.git` or a project manifest.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        if ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()) {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
