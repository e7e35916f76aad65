//! Test-tree discovery.
//!
//! `Catalog::scan` walks a test-tree root and produces a structured inventory
//! of test artifacts: which category directory they live under, which module
//! they belong to, and whether they are real test sources or thin wrapper
//! files enumerated by the external tool.
//!
//! ## Guarantees
//!
//! - Deterministic: identical filesystem state yields an identical catalog
//!   (artifacts sorted by category, then module, then path, lexical).
//! - Partial-failure tolerant: one unreadable file never aborts discovery;
//!   it is recorded as an unrecognized entry with the reason attached. Only a
//!   missing or unreadable root is fatal.
//! - Wrapper references are resolved at scan time. A wrapper that does not
//!   resolve to exactly one source artifact or source directory is demoted to
//!   an unrecognized entry.
//!
//! The catalog is rebuilt on every invocation; nothing is cached to disk.

pub mod naming;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use self::naming::{Category, WrapperName, decompose_wrapper_stem, is_excluded_stem};

pub use self::naming::{compose_lane_id, compose_wrapper_stem};

/// Fatal discovery errors. Anything below the root is recovered, not fatal.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("test tree root not found: {path}")]
    RootMissing { path: PathBuf },

    #[error("test tree root is not a directory: {path}")]
    RootNotDirectory { path: PathBuf },

    #[error("failed to read test tree root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a discovered file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// A real test source under a category directory.
    Source,
    /// A thin root-level file whose name enumerates a lane for the external tool.
    Wrapper,
}

/// One discovered test artifact. Immutable once the scan completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestArtifact {
    pub category: Category,
    /// `None` for global (cross-module) artifacts such as category entry wrappers.
    pub module: Option<String>,
    /// Path relative to the test-tree root.
    pub rel_path: PathBuf,
    pub kind: FileKind,
}

impl TestArtifact {
    /// Canonical flat lane id for this artifact: `uat-math`, or `uat` for global.
    pub fn lane_id(&self) -> String {
        compose_lane_id(self.category, self.module.as_deref())
    }
}

/// Why a file was not classified as an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum UnrecognizedReason {
    /// A root `.rs` file whose name satisfies no naming rule.
    NoNamingRule,
    /// A wrapper whose source reference resolved to zero or several targets.
    WrapperUnresolved(String),
    /// A root entry matching no category directory and no wrapper rule.
    UnknownEntry,
    /// The entry could not be read; the reason is the I/O error text.
    Unreadable(String),
}

impl std::fmt::Display for UnrecognizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnrecognizedReason::NoNamingRule => {
                write!(f, "name satisfies no wrapper naming rule")
            }
            UnrecognizedReason::WrapperUnresolved(detail) => {
                write!(f, "wrapper does not resolve to one source: {detail}")
            }
            UnrecognizedReason::UnknownEntry => {
                write!(f, "matches no category directory or naming rule")
            }
            UnrecognizedReason::Unreadable(err) => write!(f, "unreadable: {err}"),
        }
    }
}

/// A file or directory the scan observed but could not classify.
/// Recorded, excluded from lane resolution, and surfaced by the linter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnrecognizedEntry {
    /// Path relative to the test-tree root.
    pub rel_path: PathBuf,
    pub reason: UnrecognizedReason,
    /// Whether the entry sits directly under the tree root.
    pub at_root: bool,
}

/// Scan options. Exclusion patterns apply to file stems only; underscore
/// category directories (`_adhoc`, `_archive`) are matched before patterns.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub exclude: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude: vec!["_*".to_string(), "dev_*".to_string()],
        }
    }
}

/// The structured inventory of one test tree.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    artifacts: Vec<TestArtifact>,
    unrecognized: Vec<UnrecognizedEntry>,
}

impl Catalog {
    /// Walk `root` and build the inventory.
    ///
    /// Fails only when the root itself is missing, not a directory, or not
    /// readable. Everything below the root degrades to unrecognized entries.
    pub fn scan(root: &Path, options: &ScanOptions) -> Result<Catalog, CatalogError> {
        let metadata = fs::metadata(root).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CatalogError::RootMissing {
                    path: root.to_path_buf(),
                }
            } else {
                CatalogError::RootUnreadable {
                    path: root.to_path_buf(),
                    source,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(CatalogError::RootNotDirectory {
                path: root.to_path_buf(),
            });
        }

        let entries = fs::read_dir(root).map_err(|source| CatalogError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let mut walk = Walk {
            root: root.to_path_buf(),
            options,
            artifacts: Vec::new(),
            unrecognized: Vec::new(),
            pending_wrappers: Vec::new(),
        };

        for entry in entries {
            match entry {
                Ok(entry) => walk.classify_root_entry(&entry),
                Err(err) => {
                    // The entry name is unknown at this point; record the root
                    // itself as partially unreadable and keep going.
                    warn!(error = %err, "unreadable entry under test-tree root");
                    walk.unrecognized.push(UnrecognizedEntry {
                        rel_path: PathBuf::from("."),
                        reason: UnrecognizedReason::Unreadable(err.to_string()),
                        at_root: true,
                    });
                }
            }
        }

        walk.resolve_wrappers();

        let Walk {
            mut artifacts,
            mut unrecognized,
            ..
        } = walk;

        artifacts.sort_by(|a, b| {
            (a.category.as_str(), a.module.as_deref().unwrap_or(""), &a.rel_path).cmp(&(
                b.category.as_str(),
                b.module.as_deref().unwrap_or(""),
                &b.rel_path,
            ))
        });
        unrecognized.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        debug!(
            artifacts = artifacts.len(),
            unrecognized = unrecognized.len(),
            root = %root.display(),
            "catalog scan complete"
        );

        Ok(Catalog {
            root: root.to_path_buf(),
            artifacts,
            unrecognized,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All artifacts, in catalog order.
    pub fn artifacts(&self) -> &[TestArtifact] {
        &self.artifacts
    }

    pub fn unrecognized(&self) -> &[UnrecognizedEntry] {
        &self.unrecognized
    }

    /// Categories with at least one artifact, sorted by name.
    pub fn categories_present(&self) -> BTreeSet<Category> {
        self.artifacts.iter().map(|a| a.category).collect()
    }

    /// Module names present for one category, sorted.
    pub fn modules_in(&self, category: Category) -> BTreeSet<&str> {
        self.artifacts
            .iter()
            .filter(|a| a.category == category)
            .filter_map(|a| a.module.as_deref())
            .collect()
    }

    /// Module names across all enforced categories, sorted. This is the set
    /// the compliance rules quantify over.
    pub fn enforced_modules(&self) -> BTreeSet<&str> {
        self.artifacts
            .iter()
            .filter(|a| a.category.enforced())
            .filter_map(|a| a.module.as_deref())
            .collect()
    }

    /// Artifacts for an exact (category, module) pair, in catalog order.
    /// `module = None` selects global artifacts only.
    pub fn artifacts_for(&self, category: Category, module: Option<&str>) -> Vec<&TestArtifact> {
        self.artifacts
            .iter()
            .filter(|a| a.category == category && a.module.as_deref() == module)
            .collect()
    }

    /// Whether any artifact exists for (category, module).
    pub fn has_artifact(&self, category: Category, module: Option<&str>) -> bool {
        self.artifacts
            .iter()
            .any(|a| a.category == category && a.module.as_deref() == module)
    }

    /// The `<category>.rs` entry wrapper, when present.
    pub fn entry_wrapper(&self, category: Category) -> Option<&TestArtifact> {
        self.artifacts
            .iter()
            .find(|a| a.category == category && a.module.is_none() && a.kind == FileKind::Wrapper)
    }
}

// ============================================================================
// Walk state
// ============================================================================

struct Walk<'a> {
    root: PathBuf,
    options: &'a ScanOptions,
    artifacts: Vec<TestArtifact>,
    unrecognized: Vec<UnrecognizedEntry>,
    /// Root wrappers awaiting reference resolution (needs the full source set).
    pending_wrappers: Vec<(WrapperName, PathBuf)>,
}

impl Walk<'_> {
    fn classify_root_entry(&mut self, entry: &fs::DirEntry) {
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            self.record_unrecognized(&path, UnrecognizedReason::UnknownEntry, true);
            return;
        };
        if name.starts_with('.') {
            return;
        }

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(err) => {
                self.record_unrecognized(&path, UnrecognizedReason::Unreadable(err.to_string()), true);
                return;
            }
        };

        if file_type.is_dir() {
            match Category::from_dir_name(name) {
                Some(category) => self.walk_category_dir(&path, category),
                None => self.record_unrecognized(&path, UnrecognizedReason::UnknownEntry, true),
            }
            return;
        }

        // Root files: wrappers or noise.
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        if is_excluded_stem(stem, &self.options.exclude) {
            debug!(file = name, "skipping excluded root file");
            return;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            self.record_unrecognized(&path, UnrecognizedReason::UnknownEntry, true);
            return;
        }
        match decompose_wrapper_stem(stem) {
            Some(wrapper) => self.pending_wrappers.push((wrapper, path)),
            None => self.record_unrecognized(&path, UnrecognizedReason::NoNamingRule, true),
        }
    }

    /// Walk one category directory, collecting source artifacts.
    ///
    /// A nested directory whose name is itself a category directory re-roots
    /// classification to that category: the longest directory prefix wins
    /// (e.g. files under `chaos/_adhoc/` are `adhoc`).
    fn walk_category_dir(&mut self, dir: &Path, category: Category) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.record_unrecognized(dir, UnrecognizedReason::Unreadable(err.to_string()), false);
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_unrecognized(
                        dir,
                        UnrecognizedReason::Unreadable(err.to_string()),
                        false,
                    );
                    continue;
                }
            };
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                self.record_unrecognized(&path, UnrecognizedReason::UnknownEntry, false);
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(err) => {
                    self.record_unrecognized(
                        &path,
                        UnrecognizedReason::Unreadable(err.to_string()),
                        false,
                    );
                    continue;
                }
            };

            if file_type.is_dir() {
                match Category::from_dir_name(&name) {
                    // Longest prefix wins: the inner category takes over.
                    Some(inner) => self.walk_category_dir(&path, inner),
                    None => self.walk_module_dir(&path, category, &name),
                }
                continue;
            }

            self.classify_source_file(&path, category, None);
        }
    }

    /// Walk a module grouping directory (`sanity/strings/`): every file below
    /// belongs to that module, except nested category directories which again
    /// re-root by longest prefix.
    fn walk_module_dir(&mut self, dir: &Path, category: Category, module: &str) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.record_unrecognized(dir, UnrecognizedReason::Unreadable(err.to_string()), false);
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_unrecognized(
                        dir,
                        UnrecognizedReason::Unreadable(err.to_string()),
                        false,
                    );
                    continue;
                }
            };
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                self.record_unrecognized(&path, UnrecognizedReason::UnknownEntry, false);
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(err) => {
                    self.record_unrecognized(
                        &path,
                        UnrecognizedReason::Unreadable(err.to_string()),
                        false,
                    );
                    continue;
                }
            };

            if file_type.is_dir() {
                match Category::from_dir_name(&name) {
                    Some(inner) => self.walk_category_dir(&path, inner),
                    // Deeper nesting stays grouped under the top module dir.
                    None => self.walk_module_dir(&path, category, module),
                }
                continue;
            }

            self.classify_source_file(&path, category, Some(module));
        }
    }

    /// Classify one file under a category directory.
    ///
    /// `module` is `Some` when the file sits inside a module grouping
    /// directory; otherwise the module is derived from the file stem, with a
    /// redundant `<category>_` prefix stripped (`sanity/sanity_math.rs` and
    /// `sanity/math.rs` both name module `math`).
    fn classify_source_file(&mut self, path: &Path, category: Category, module: Option<&str>) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            self.record_unrecognized(path, UnrecognizedReason::UnknownEntry, false);
            return;
        };
        if is_excluded_stem(stem, &self.options.exclude) {
            debug!(file = %path.display(), "skipping excluded file");
            return;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            self.record_unrecognized(path, UnrecognizedReason::UnknownEntry, false);
            return;
        }

        let module = match module {
            Some(module) => module.to_string(),
            None => {
                let prefix = format!("{}_", category.as_str());
                stem.strip_prefix(&prefix).unwrap_or(stem).to_string()
            }
        };

        let rel_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_path_buf();
        self.artifacts.push(TestArtifact {
            category,
            module: Some(module),
            rel_path,
            kind: FileKind::Source,
        });
    }

    /// Resolve each pending wrapper against the collected sources and the
    /// filesystem. A wrapper must reference exactly one of:
    /// a source file `<dir>/<module>.rs`, a prefixed source file
    /// `<dir>/<category>_<module>.rs`, or a source directory `<dir>/<module>/`.
    /// Entry wrappers (`<category>.rs`) reference the category directory.
    fn resolve_wrappers(&mut self) {
        let pending = std::mem::take(&mut self.pending_wrappers);
        for (wrapper, path) in pending {
            let category_dir = self.root.join(wrapper.category.dir_name());
            let rel_path = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();

            let resolution = match &wrapper.module {
                None => {
                    if category_dir.is_dir() {
                        Ok(())
                    } else {
                        Err(format!(
                            "no {} directory for category entry",
                            wrapper.category.dir_name()
                        ))
                    }
                }
                Some(module) => {
                    let mut targets = Vec::new();
                    let plain = category_dir.join(format!("{module}.rs"));
                    if plain.is_file() {
                        targets.push(format!("{}/{module}.rs", wrapper.category.dir_name()));
                    }
                    let prefixed =
                        category_dir.join(format!("{}_{module}.rs", wrapper.category.as_str()));
                    if prefixed.is_file() {
                        targets.push(format!(
                            "{}/{}_{module}.rs",
                            wrapper.category.dir_name(),
                            wrapper.category.as_str()
                        ));
                    }
                    let grouped = category_dir.join(module);
                    if grouped.is_dir() {
                        targets.push(format!("{}/{module}/", wrapper.category.dir_name()));
                    }
                    match targets.len() {
                        1 => Ok(()),
                        0 => Err("no matching source artifact or directory".to_string()),
                        _ => Err(format!("several targets: {}", targets.join(", "))),
                    }
                }
            };

            match resolution {
                Ok(()) => self.artifacts.push(TestArtifact {
                    category: wrapper.category,
                    module: wrapper.module.clone(),
                    rel_path,
                    kind: FileKind::Wrapper,
                }),
                Err(detail) => {
                    warn!(wrapper = %rel_path.display(), detail, "demoting unresolved wrapper");
                    self.unrecognized.push(UnrecognizedEntry {
                        rel_path,
                        reason: UnrecognizedReason::WrapperUnresolved(detail),
                        at_root: true,
                    });
                }
            }
        }
    }

    fn record_unrecognized(&mut self, path: &Path, reason: UnrecognizedReason, at_root: bool) {
        let rel_path = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();
        self.unrecognized.push(UnrecognizedEntry {
            rel_path,
            reason,
            at_root,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
