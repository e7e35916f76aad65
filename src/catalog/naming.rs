//! Lane categories and the naming-rule table.
//!
//! Wrapper files at the test-tree root must satisfy one of the naming rules:
//!
//! - `<category>.rs` — category entry wrapper (global module)
//! - `<category>_<module>.rs` — module-scoped wrapper
//!
//! Legacy flat lane tokens (`uat-math`) are decomposed here as well, by
//! category-prefix matching, longest prefix first.
//!
//! The rule table and category list are process-wide constants, never mutated.

use std::fmt;

// ============================================================================
// Categories
// ============================================================================

/// A test category, matching one top-level directory of the test tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Unit,
    Sanity,
    Smoke,
    Integration,
    E2e,
    Uat,
    Chaos,
    Bench,
    Adhoc,
    Archive,
}

impl Category {
    /// Every known category, in declaration order.
    pub const ALL: [Category; 10] = [
        Category::Unit,
        Category::Sanity,
        Category::Smoke,
        Category::Integration,
        Category::E2e,
        Category::Uat,
        Category::Chaos,
        Category::Bench,
        Category::Adhoc,
        Category::Archive,
    ];

    /// Canonical lowercase name, as used in wrapper stems and lane ids.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Unit => "unit",
            Category::Sanity => "sanity",
            Category::Smoke => "smoke",
            Category::Integration => "integration",
            Category::E2e => "e2e",
            Category::Uat => "uat",
            Category::Chaos => "chaos",
            Category::Bench => "bench",
            Category::Adhoc => "adhoc",
            Category::Archive => "archive",
        }
    }

    /// On-disk directory name. Exempt categories live under underscore-prefixed
    /// directories (`_adhoc`, `_archive`).
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Adhoc => "_adhoc",
            Category::Archive => "_archive",
            other => other.as_str(),
        }
    }

    /// Parse a canonical category name (`"sanity"`, `"uat"`, ...).
    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Parse an on-disk directory name (`"sanity"`, `"_adhoc"`, ...).
    pub fn from_dir_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.dir_name() == name)
    }

    /// Whether compliance rules apply to artifacts in this category.
    /// `adhoc` and `archive` are exempt and excluded from default lane resolution.
    pub fn enforced(self) -> bool {
        !matches!(self, Category::Adhoc | Category::Archive)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Naming rules
// ============================================================================

/// One entry of the wrapper naming-rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingRule {
    /// Stable rule identifier, referenced by violations.
    pub id: &'static str,
    /// Human-readable pattern, for violation messages.
    pub pattern: &'static str,
}

/// Rule for category entry wrappers: `<category>.rs`.
pub const RULE_CATEGORY_ENTRY: NamingRule = NamingRule {
    id: "wrapper-category-entry",
    pattern: "<category>.rs",
};

/// Rule for module-scoped wrappers: `<category>_<module>.rs`.
pub const RULE_CATEGORY_MODULE: NamingRule = NamingRule {
    id: "wrapper-category-module",
    pattern: "<category>_<module>.rs",
};

/// The process-wide naming-rule table.
pub const NAMING_RULES: [NamingRule; 2] = [RULE_CATEGORY_ENTRY, RULE_CATEGORY_MODULE];

/// A wrapper file name decomposed against the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperName {
    pub category: Category,
    /// `None` for category entry wrappers (the global module).
    pub module: Option<String>,
    /// The rule the name satisfied.
    pub rule: NamingRule,
}

/// Decompose a wrapper file stem against the naming-rule table.
///
/// Returns `None` when the stem satisfies no rule; the catalog records such
/// files as unrecognized and the linter reports them.
pub fn decompose_wrapper_stem(stem: &str) -> Option<WrapperName> {
    // `<category>.rs` entry wrapper
    if let Some(category) = Category::from_name(stem) {
        return Some(WrapperName {
            category,
            module: None,
            rule: RULE_CATEGORY_ENTRY,
        });
    }

    // `<category>_<module>.rs` scoped wrapper. Category names contain no
    // underscore, so the first underscore is the separator.
    let (prefix, module) = stem.split_once('_')?;
    if module.is_empty() {
        return None;
    }
    let category = Category::from_name(prefix)?;
    Some(WrapperName {
        category,
        module: Some(module.to_string()),
        rule: RULE_CATEGORY_MODULE,
    })
}

/// Candidate decompositions of a legacy flat lane token (`uat-math`),
/// longest category prefix first.
///
/// The caller treats exactly one candidate as a successful decomposition;
/// zero or several is an ambiguous token.
pub fn flat_token_candidates(token: &str) -> Vec<(Category, Option<String>)> {
    let mut categories: Vec<Category> = Category::ALL.to_vec();
    categories.sort_by_key(|c| std::cmp::Reverse(c.as_str().len()));

    let mut candidates = Vec::new();
    for category in categories {
        let name = category.as_str();
        if token == name {
            candidates.push((category, None));
        } else if let Some(rest) = token.strip_prefix(name) {
            if let Some(module) = rest.strip_prefix('-') {
                if !module.is_empty() {
                    candidates.push((category, Some(module.to_string())));
                }
            }
        }
    }
    candidates
}

/// Compose the canonical flat lane id for (category, module).
///
/// Inverse of [`flat_token_candidates`] for unique tokens:
/// `uat-math` → (uat, math) → `uat-math`.
pub fn compose_lane_id(category: Category, module: Option<&str>) -> String {
    match module {
        Some(module) => format!("{}-{}", category.as_str(), module),
        None => category.as_str().to_string(),
    }
}

/// Compose the wrapper stem for (category, module): `uat_math` / `uat`.
pub fn compose_wrapper_stem(category: Category, module: Option<&str>) -> String {
    match module {
        Some(module) => format!("{}_{}", category.as_str(), module),
        None => category.as_str().to_string(),
    }
}

// ============================================================================
// Exclusion patterns
// ============================================================================

/// Check a file stem against exclusion patterns (`_*`, `dev_*`, `*~`, exact).
///
/// Excluded stems are skipped during catalog classification entirely; they are
/// neither artifacts nor unrecognized entries.
pub fn is_excluded_stem(stem: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            stem.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            stem.ends_with(suffix)
        } else {
            stem == pattern
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.as_str()), Some(category));
            assert_eq!(Category::from_dir_name(category.dir_name()), Some(category));
        }
    }

    #[test]
    fn exempt_categories_use_underscore_dirs() {
        assert_eq!(Category::Adhoc.dir_name(), "_adhoc");
        assert_eq!(Category::Archive.dir_name(), "_archive");
        assert!(!Category::Adhoc.enforced());
        assert!(!Category::Archive.enforced());
        assert!(Category::Sanity.enforced());
    }

    #[test]
    fn decompose_entry_wrapper() {
        let name = decompose_wrapper_stem("sanity").unwrap();
        assert_eq!(name.category, Category::Sanity);
        assert_eq!(name.module, None);
        assert_eq!(name.rule.id, RULE_CATEGORY_ENTRY.id);
    }

    #[test]
    fn decompose_scoped_wrapper() {
        let name = decompose_wrapper_stem("uat_math").unwrap();
        assert_eq!(name.category, Category::Uat);
        assert_eq!(name.module.as_deref(), Some("math"));
        assert_eq!(name.rule.id, RULE_CATEGORY_MODULE.id);
    }

    #[test]
    fn decompose_keeps_module_underscores() {
        let name = decompose_wrapper_stem("sanity_string_utils").unwrap();
        assert_eq!(name.module.as_deref(), Some("string_utils"));
    }

    #[test]
    fn decompose_rejects_unknown_stems() {
        assert_eq!(decompose_wrapper_stem("helpers"), None);
        assert_eq!(decompose_wrapper_stem("math_sanity"), None);
        assert_eq!(decompose_wrapper_stem("sanity_"), None);
    }

    #[test]
    fn flat_token_unique_decomposition() {
        let candidates = flat_token_candidates("uat-math");
        assert_eq!(candidates, vec![(Category::Uat, Some("math".to_string()))]);
    }

    #[test]
    fn flat_token_bare_category() {
        let candidates = flat_token_candidates("sanity");
        assert_eq!(candidates, vec![(Category::Sanity, None)]);
    }

    #[test]
    fn flat_token_unknown() {
        assert!(flat_token_candidates("banana").is_empty());
        assert!(flat_token_candidates("uat-").is_empty());
    }

    #[test]
    fn flat_token_module_may_contain_hyphens() {
        let candidates = flat_token_candidates("e2e-login-flow");
        assert_eq!(
            candidates,
            vec![(Category::E2e, Some("login-flow".to_string()))]
        );
    }

    #[test]
    fn compose_lane_id_round_trip() {
        let id = compose_lane_id(Category::Uat, Some("math"));
        assert_eq!(id, "uat-math");
        let candidates = flat_token_candidates(&id);
        assert_eq!(candidates, vec![(Category::Uat, Some("math".to_string()))]);
    }

    #[test]
    fn excluded_stems() {
        let patterns = vec!["_*".to_string(), "dev_*".to_string(), "*~".to_string()];
        assert!(is_excluded_stem("_scratch", &patterns));
        assert!(is_excluded_stem("dev_probe", &patterns));
        assert!(is_excluded_stem("notes~", &patterns));
        assert!(!is_excluded_stem("sanity_math", &patterns));
        // `dev` itself is not excluded, only dev_*
        assert!(!is_excluded_stem("dev", &patterns));
    }
}
