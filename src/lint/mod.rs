//! Compliance linting.
//!
//! The linter is a pure function over a [`Catalog`]: it performs no I/O of its
//! own and, for identical catalog input, produces an identical, order-stable
//! violation sequence (sorted by artifact path, then rule id).
//!
//! Blocking rules:
//!
//! - every module with at least one artifact must have both a `sanity` and a
//!   `uat` artifact;
//! - every root wrapper file name must decompose against the naming-rule
//!   table;
//! - no unrecognized entries directly under the tree root, except those on
//!   the allow-list.
//!
//! Warning rules (reported, never block):
//!
//! - a category with artifacts but no `<category>.rs` entry wrapper;
//! - unclassifiable files nested inside category directories.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::naming::{Category, compose_wrapper_stem};
use crate::catalog::{Catalog, UnrecognizedReason};

// ============================================================================
// Rule ids
// ============================================================================

pub const RULE_MISSING_SANITY: &str = "missing-sanity";
pub const RULE_MISSING_UAT: &str = "missing-uat";
pub const RULE_WRAPPER_NAMING: &str = "wrapper-naming";
pub const RULE_ROOT_ENTRY: &str = "unrecognized-root-entry";
pub const RULE_MISSING_ENTRY_FILE: &str = "missing-category-entry";
pub const RULE_STRAY_ARTIFACT: &str = "stray-artifact";

// ============================================================================
// Violation model
// ============================================================================

/// Whether a violation halts execution under `strict` enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Warning,
}

/// One compliance violation. Produced fresh each lint pass, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// The offending path, or the expected path for missing-artifact rules.
    /// Relative to the test-tree root.
    pub artifact_path: PathBuf,
    pub rule_id: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl Violation {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Blocking => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{tag}[{}]: {} ({})",
            self.rule_id,
            self.message,
            self.artifact_path.display()
        )
    }
}

/// Lint options: extra names permitted directly under the tree root.
/// `_adhoc` and `_archive` are category directories and never flagged.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    pub allowed_root_entries: Vec<String>,
}

// ============================================================================
// Checks
// ============================================================================

/// Run every compliance rule over the catalog.
pub fn check(catalog: &Catalog, options: &LintOptions) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_required_categories(catalog, &mut violations);
    check_unrecognized(catalog, options, &mut violations);
    check_entry_files(catalog, &mut violations);

    violations.sort_by(|a, b| {
        (&a.artifact_path, a.rule_id).cmp(&(&b.artifact_path, b.rule_id))
    });
    violations
}

/// Every module with any artifact needs both a sanity and a uat artifact.
fn check_required_categories(catalog: &Catalog, violations: &mut Vec<Violation>) {
    for module in catalog.enforced_modules() {
        for (category, rule_id) in [
            (Category::Sanity, RULE_MISSING_SANITY),
            (Category::Uat, RULE_MISSING_UAT),
        ] {
            if !catalog.has_artifact(category, Some(module)) {
                violations.push(Violation {
                    artifact_path: PathBuf::from(format!(
                        "{}.rs",
                        compose_wrapper_stem(category, Some(module))
                    )),
                    rule_id,
                    message: format!("module {module} missing {category}"),
                    severity: Severity::Blocking,
                });
            }
        }
    }
}

/// Root wrapper names must decompose; other root entries must be allow-listed.
/// Nested unclassifiable files are downgraded to warnings.
fn check_unrecognized(catalog: &Catalog, options: &LintOptions, violations: &mut Vec<Violation>) {
    for entry in catalog.unrecognized() {
        if entry.at_root {
            let name = entry
                .rel_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");
            if options.allowed_root_entries.iter().any(|a| a == name) {
                continue;
            }
        }

        let (rule_id, severity) = match (&entry.reason, entry.at_root) {
            (UnrecognizedReason::NoNamingRule, _) => (RULE_WRAPPER_NAMING, Severity::Blocking),
            (_, true) => (RULE_ROOT_ENTRY, Severity::Blocking),
            (_, false) => (RULE_STRAY_ARTIFACT, Severity::Warning),
        };

        violations.push(Violation {
            artifact_path: entry.rel_path.clone(),
            rule_id,
            message: entry.reason.to_string(),
            severity,
        });
    }
}

/// A category with artifacts should carry its `<category>.rs` entry wrapper.
fn check_entry_files(catalog: &Catalog, violations: &mut Vec<Violation>) {
    for category in catalog.categories_present() {
        if !category.enforced() {
            continue;
        }
        if catalog.entry_wrapper(category).is_none() {
            violations.push(Violation {
                artifact_path: PathBuf::from(format!("{category}.rs")),
                rule_id: RULE_MISSING_ENTRY_FILE,
                message: format!("category {category} has no entry wrapper"),
                severity: Severity::Warning,
            });
        }
    }
}

// ============================================================================
// Reporting helpers
// ============================================================================

/// Whether any violation is blocking.
pub fn has_blocking(violations: &[Violation]) -> bool {
    violations.iter().any(Violation::is_blocking)
}

/// Violation counts keyed by rule id, for summaries.
pub fn summary_counts(violations: &[Violation]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for violation in violations {
        *counts.entry(violation.rule_id).or_insert(0) += 1;
    }
    counts
}

/// Render the detailed violation report (`lint --violations`).
///
/// Plain text, one violation per line, grouped counts at the top. Ceremony
/// rendering is an external concern; this is the documented fallback format.
pub fn render_report(violations: &[Violation]) -> String {
    let blocking = violations.iter().filter(|v| v.is_blocking()).count();
    let warnings = violations.len() - blocking;

    let mut out = String::new();
    out.push_str(&format!(
        "{} violation(s): {} blocking, {} warning(s)\n",
        violations.len(),
        blocking,
        warnings
    ));
    for (rule_id, count) in summary_counts(violations) {
        out.push_str(&format!("  {rule_id}: {count}\n"));
    }
    if !violations.is_empty() {
        out.push('\n');
    }
    for violation in violations {
        out.push_str(&format!("{violation}\n"));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
