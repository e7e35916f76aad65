//! Lane resolution.
//!
//! A lane is one (category, module) unit of execution. The resolver turns an
//! optional user-supplied filter into the concrete, ordered set of runnable
//! lanes backed by catalog artifacts:
//!
//! 1. omitted category → every category present in the catalog (exempt
//!    categories stay out unless named explicitly);
//! 2. omitted module → every module present for each selected category, plus
//!    a synthetic global lane when cross-module artifacts exist;
//! 3. legacy flat tokens (`uat-math`) decompose by category prefix, longest
//!    first;
//! 4. a filter matching zero artifacts is an error, never an empty success.
//!
//! Resolution is a pure function over the catalog: resolving the same filter
//! twice against an unchanged catalog yields value-equal lane sequences.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::naming::{
    Category, compose_lane_id, compose_wrapper_stem, flat_token_candidates,
};
use crate::catalog::{Catalog, FileKind, TestArtifact};

/// Errors resolving a lane filter. Fatal to the invocation (exit 1).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaneError {
    #[error("no lane matches `{filter}`; known lanes: {}", candidates.join(", "))]
    NoSuchLane {
        filter: String,
        candidates: Vec<String>,
    },

    #[error("cannot decompose lane token `{token}` uniquely; candidates: {}", candidates.join(", "))]
    AmbiguousLane {
        token: String,
        candidates: Vec<String>,
    },

    #[error("lane token `{token}` already names a module; drop the extra `{module}` argument")]
    ConflictingFilter { token: String, module: String },
}

/// A parsed (category, module) filter. Empty means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneFilter {
    pub category: Option<Category>,
    pub module: Option<String>,
}

impl std::fmt::Display for LaneFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.category, self.module.as_deref()) {
            (Some(category), module) => f.write_str(&compose_lane_id(category, module)),
            (None, Some(module)) => write!(f, "*-{module}"),
            (None, None) => f.write_str("*"),
        }
    }
}

/// One runnable lane with its backing artifacts, in catalog order.
/// Built per invocation; owned exclusively by the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneSpec {
    pub category: Category,
    /// `None` is the synthetic global lane of a category.
    pub module: Option<String>,
    pub artifacts: Vec<TestArtifact>,
}

impl LaneSpec {
    /// Canonical flat id: `uat-math`, or `uat` for the global lane.
    pub fn lane_id(&self) -> String {
        compose_lane_id(self.category, self.module.as_deref())
    }

    /// The stem the external tool is scoped to: the lane's wrapper stem when a
    /// wrapper artifact exists, otherwise the canonical composed stem.
    pub fn wrapper_stem(&self) -> String {
        self.artifacts
            .iter()
            .find(|a| a.kind == FileKind::Wrapper)
            .and_then(|a| a.rel_path.file_stem())
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| compose_wrapper_stem(self.category, self.module.as_deref()))
    }
}

// ============================================================================
// Filter parsing
// ============================================================================

/// Parse the CLI positionals into a filter.
///
/// The first positional is either a plain category name, a profile alias, or
/// a legacy flat token; the optional second positional is the module.
pub fn parse_filter(
    category_arg: Option<&str>,
    module_arg: Option<&str>,
    aliases: &BTreeMap<String, String>,
) -> Result<LaneFilter, LaneError> {
    let Some(raw) = category_arg else {
        return Ok(LaneFilter::default());
    };
    let token = aliases.get(raw).map(String::as_str).unwrap_or(raw);

    if let Some(category) = Category::from_name(token) {
        return Ok(LaneFilter {
            category: Some(category),
            module: module_arg.map(str::to_string),
        });
    }

    let candidates = flat_token_candidates(token);
    match candidates.as_slice() {
        [(category, module)] => {
            if module.is_some() {
                if let Some(extra) = module_arg {
                    return Err(LaneError::ConflictingFilter {
                        token: token.to_string(),
                        module: extra.to_string(),
                    });
                }
            }
            Ok(LaneFilter {
                category: Some(*category),
                module: module
                    .clone()
                    .or_else(|| module_arg.map(str::to_string)),
            })
        }
        [] => Err(LaneError::AmbiguousLane {
            token: token.to_string(),
            candidates: Category::ALL.iter().map(|c| c.as_str().to_string()).collect(),
        }),
        several => Err(LaneError::AmbiguousLane {
            token: token.to_string(),
            candidates: several
                .iter()
                .map(|(c, m)| compose_lane_id(*c, m.as_deref()))
                .collect(),
        }),
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a filter into the ordered lane set.
pub fn resolve(catalog: &Catalog, filter: &LaneFilter) -> Result<Vec<LaneSpec>, LaneError> {
    let mut categories: Vec<Category> = match filter.category {
        Some(category) => vec![category],
        // Exempt categories only run when named explicitly.
        None => catalog
            .categories_present()
            .into_iter()
            .filter(|c| c.enforced())
            .collect(),
    };
    categories.sort_by_key(|c| c.as_str());

    let mut lanes = Vec::new();
    for category in categories {
        let modules: Vec<Option<String>> = match &filter.module {
            Some(module) => vec![Some(module.clone())],
            None => {
                let mut modules = Vec::new();
                // Synthetic global lane first, mirroring catalog order.
                if catalog.has_artifact(category, None) {
                    modules.push(None);
                }
                modules.extend(
                    catalog
                        .modules_in(category)
                        .into_iter()
                        .map(|m| Some(m.to_string())),
                );
                modules
            }
        };

        for module in modules {
            let artifacts: Vec<TestArtifact> = catalog
                .artifacts_for(category, module.as_deref())
                .into_iter()
                .cloned()
                .collect();
            if artifacts.is_empty() {
                continue;
            }
            lanes.push(LaneSpec {
                category,
                module,
                artifacts,
            });
        }
    }

    if lanes.is_empty() {
        return Err(LaneError::NoSuchLane {
            filter: filter.to_string(),
            candidates: known_lane_ids(catalog),
        });
    }
    Ok(lanes)
}

/// Every lane id present in the catalog, for error reporting.
fn known_lane_ids(catalog: &Catalog) -> Vec<String> {
    let mut ids: Vec<String> = catalog.artifacts().iter().map(TestArtifact::lane_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScanOptions;
    use std::fs;
    use std::path::Path;

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

    fn no_aliases() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn parse_plain_category_and_module() {
        let filter = parse_filter(Some("uat"), Some("math"), &no_aliases()).unwrap();
        assert_eq!(filter.category, Some(Category::Uat));
        assert_eq!(filter.module.as_deref(), Some("math"));
    }

    #[test]
    fn parse_flat_token() {
        let filter = parse_filter(Some("uat-math"), None, &no_aliases()).unwrap();
        assert_eq!(filter.category, Some(Category::Uat));
        assert_eq!(filter.module.as_deref(), Some("math"));
    }

    #[test]
    fn parse_flat_token_conflicts_with_module_arg() {
        let err = parse_filter(Some("uat-math"), Some("extra"), &no_aliases()).unwrap_err();
        assert!(matches!(err, LaneError::ConflictingFilter { .. }));
    }

    #[test]
    fn parse_unknown_token_is_ambiguous() {
        let err = parse_filter(Some("banana"), None, &no_aliases()).unwrap_err();
        assert!(matches!(err, LaneError::AmbiguousLane { .. }));
    }

    #[test]
    fn parse_profile_alias() {
        let mut aliases = BTreeMap::new();
        aliases.insert("quick".to_string(), "sanity".to_string());
        let filter = parse_filter(Some("quick"), None, &aliases).unwrap();
        assert_eq!(filter.category, Some(Category::Sanity));
    }

    #[test]
    fn resolve_exact_pair() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "sanity/strings.rs");
        touch(root, "sanity_strings.rs");

        let catalog = scan(root);
        let filter = LaneFilter {
            category: Some(Category::Sanity),
            module: Some("strings".to_string()),
        };
        let lanes = resolve(&catalog, &filter).unwrap();
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].lane_id(), "sanity-strings");
        assert_eq!(lanes[0].artifacts.len(), 2);
        assert_eq!(lanes[0].wrapper_stem(), "sanity_strings");
    }

    #[test]
    fn resolve_everything_orders_lanes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "sanity/strings.rs");
        touch(root, "sanity/math.rs");
        touch(root, "sanity.rs");
        touch(root, "uat/math.rs");

        let lanes = resolve(&scan(root), &LaneFilter::default()).unwrap();
        let ids: Vec<_> = lanes.iter().map(LaneSpec::lane_id).collect();
        assert_eq!(ids, vec!["sanity", "sanity-math", "sanity-strings", "uat-math"]);
    }

    #[test]
    fn resolve_skips_exempt_categories_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "sanity/math.rs");
        touch(root, "_adhoc/probe.rs");

        let lanes = resolve(&scan(root), &LaneFilter::default()).unwrap();
        assert!(lanes.iter().all(|l| l.category != Category::Adhoc));

        let filter = LaneFilter {
            category: Some(Category::Adhoc),
            module: None,
        };
        let lanes = resolve(&scan(root), &filter).unwrap();
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].lane_id(), "adhoc-probe");
    }

    #[test]
    fn resolve_missing_module_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "uat/math.rs");

        let filter = LaneFilter {
            category: Some(Category::Uat),
            module: Some("nonexistentmodule".to_string()),
        };
        let err = resolve(&scan(root), &filter).unwrap_err();
        match err {
            LaneError::NoSuchLane { filter, candidates } => {
                assert_eq!(filter, "uat-nonexistentmodule");
                assert_eq!(candidates, vec!["uat-math".to_string()]);
            }
            other => panic!("expected NoSuchLane, got {other:?}"),
        }
    }

    #[test]
    fn resolve_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "sanity/strings.rs");
        touch(root, "uat/strings.rs");

        let catalog = scan(root);
        let filter = LaneFilter {
            category: Some(Category::Sanity),
            module: None,
        };
        let first = resolve(&catalog, &filter).unwrap();
        let second = resolve(&catalog, &filter).unwrap();
        assert_eq!(first, second);
    }
}
