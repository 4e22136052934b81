//! Retrieval scopes — what to fetch, and how much, for each complexity level.
//!
//! A [`RetrievalScope`] bounds the context gathered for a query: path rules,
//! token and item ceilings, which collaborators may be consulted and how deep.
//! The [`ScopeCatalog`] holds one immutable scope per [`ComplexityLevel`],
//! built once on first use and shared for the life of the process.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Ordered classification of a query's expected retrieval breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// Function signature or API lookup.
    Simple,
    /// Single-file fix or feature.
    Focused,
    /// Multi-file change.
    Moderate,
    /// Architectural question.
    Complex,
    /// Multi-service debugging.
    CrossService,
}

impl ComplexityLevel {
    /// All levels, cheapest first.
    pub const ALL: [ComplexityLevel; 5] = [
        ComplexityLevel::Simple,
        ComplexityLevel::Focused,
        ComplexityLevel::Moderate,
        ComplexityLevel::Complex,
        ComplexityLevel::CrossService,
    ];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Focused => "focused",
            ComplexityLevel::Moderate => "moderate",
            ComplexityLevel::Complex => "complex",
            ComplexityLevel::CrossService => "cross_service",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filtering and budget configuration bound to a complexity level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalScope {
    /// Query category label (e.g. "api_lookup").
    pub query_type: String,
    /// Level this scope serves.
    pub level: ComplexityLevel,
    /// Path substrings an item must contain one of (empty = any).
    pub include: Vec<String>,
    /// Path substrings that exclude an item.
    pub exclude: Vec<String>,
    /// Kinds of material this scope is meant to surface. Informational.
    pub focus: Vec<String>,
    /// Token ceiling for packed context.
    pub max_tokens: usize,
    /// Maximum number of delivered items.
    pub max_items: usize,
    /// Consult the call graph.
    pub enable_graph: bool,
    /// Consult version-control history.
    pub enable_history: bool,
    /// Consult web search.
    pub enable_web: bool,
    /// Call-graph traversal depth.
    pub graph_depth: u32,
    /// History lookback window in days.
    pub history_days: u32,
    /// Minimum relevance for a semantic hit to be kept.
    pub min_relevance: f64,
}

impl RetrievalScope {
    /// Whether an item with this path passes the scope's path rules.
    ///
    /// Exclusions win; a non-empty include list then requires a match.
    pub fn includes(&self, path: &str) -> bool {
        if self.exclude.iter().any(|pattern| path.contains(pattern.as_str())) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|pattern| path.contains(pattern.as_str()))
    }

    /// A copy of this scope adjusted for an auxiliary intent hint.
    ///
    /// The catalog entry itself is never modified.
    pub fn with_hint(&self, hint: ScopeHint) -> RetrievalScope {
        let mut scope = self.clone();
        match hint {
            ScopeHint::WebSearch => scope.enable_web = true,
            ScopeHint::Explanation => scope.graph_depth = 2,
            ScopeHint::SecurityReview => {
                scope.max_tokens = 200_000;
                scope.max_items = 100;
            }
        }
        scope
    }

    /// A copy with additional exclude substrings appended.
    pub fn with_excludes<I, S>(&self, extra: I) -> RetrievalScope
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut scope = self.clone();
        for pattern in extra {
            let pattern = pattern.into();
            if !scope.exclude.contains(&pattern) {
                scope.exclude.push(pattern);
            }
        }
        scope
    }
}

/// Auxiliary intent label that adjusts a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeHint {
    /// Force web lookups on.
    WebSearch,
    /// Shallow call-graph context is enough to explain code.
    Explanation,
    /// Include as much as possible; the security filter still applies.
    SecurityReview,
}

/// Error for an unrecognised hint label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scope hint: {0:?}")]
pub struct UnknownScopeHint(pub String);

impl FromStr for ScopeHint {
    type Err = UnknownScopeHint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_search" => Ok(ScopeHint::WebSearch),
            "explanation" => Ok(ScopeHint::Explanation),
            "security_review" => Ok(ScopeHint::SecurityReview),
            other => Err(UnknownScopeHint(other.to_string())),
        }
    }
}

/// Read-only table of one scope per complexity level.
#[derive(Debug)]
pub struct ScopeCatalog {
    scopes: [RetrievalScope; 5],
}

static CATALOG: LazyLock<ScopeCatalog> = LazyLock::new(ScopeCatalog::build);

impl ScopeCatalog {
    /// The process-wide catalog.
    pub fn global() -> &'static ScopeCatalog {
        &CATALOG
    }

    /// Scope for a level. Falls back to the focused scope.
    pub fn scope_for(&self, level: ComplexityLevel) -> &RetrievalScope {
        match self.scopes.iter().find(|s| s.level == level) {
            Some(scope) => scope,
            None => &self.scopes[ComplexityLevel::Focused as usize],
        }
    }

    /// All scopes, cheapest first.
    pub fn scopes(&self) -> &[RetrievalScope] {
        &self.scopes
    }

    fn build() -> Self {
        let scopes = [
            RetrievalScope {
                query_type: "api_lookup".into(),
                level: ComplexityLevel::Simple,
                include: Vec::new(),
                exclude: strings(&["node_modules/", "vendor/", "__pycache__/", "generated/", "tests/"]),
                focus: strings(&["function_signature", "docstring", "type_hints"]),
                max_tokens: 5_000,
                max_items: 1,
                enable_graph: false,
                enable_history: false,
                enable_web: false,
                graph_depth: 0,
                history_days: 0,
                min_relevance: 0.7,
            },
            RetrievalScope {
                query_type: "bug_fix".into(),
                level: ComplexityLevel::Focused,
                include: Vec::new(),
                exclude: strings(&["node_modules/", "vendor/", "generated/", "dist/", "build/"]),
                focus: strings(&[
                    "error_location",
                    "service_implementation",
                    "related_tests",
                    "recent_changes",
                    "error_logs",
                ]),
                max_tokens: 30_000,
                max_items: 5,
                enable_graph: true,
                enable_history: true,
                enable_web: false,
                graph_depth: 2,
                history_days: 7,
                min_relevance: 0.7,
            },
            RetrievalScope {
                query_type: "refactoring".into(),
                level: ComplexityLevel::Moderate,
                include: Vec::new(),
                exclude: strings(&["node_modules/", "vendor/", "dist/", "build/", ".git/"]),
                focus: strings(&[
                    "target_files",
                    "dependent_code",
                    "tests",
                    "api_contracts",
                    "documentation",
                    "related_components",
                ]),
                max_tokens: 50_000,
                max_items: 15,
                enable_graph: true,
                enable_history: true,
                enable_web: false,
                graph_depth: 3,
                history_days: 30,
                min_relevance: 0.65,
            },
            RetrievalScope {
                query_type: "architecture".into(),
                level: ComplexityLevel::Complex,
                include: Vec::new(),
                exclude: strings(&["node_modules/", "vendor/", "dist/", "build/", ".git/", "tmp/"]),
                focus: strings(&[
                    "architecture_diagrams",
                    "service_implementations",
                    "api_definitions",
                    "database_schemas",
                    "design_docs",
                    "dependencies",
                    "integration_points",
                ]),
                max_tokens: 100_000,
                max_items: 30,
                enable_graph: true,
                enable_history: true,
                enable_web: true,
                graph_depth: 4,
                history_days: 90,
                min_relevance: 0.6,
            },
            RetrievalScope {
                query_type: "cross_service_debugging".into(),
                level: ComplexityLevel::CrossService,
                include: Vec::new(),
                exclude: strings(&["node_modules/", "vendor/", "dist/", "build/", ".git/"]),
                focus: strings(&[
                    "service_boundaries",
                    "api_contracts",
                    "message_schemas",
                    "service_implementations",
                    "logs_from_all_services",
                    "integration_tests",
                    "monitoring_data",
                ]),
                max_tokens: 150_000,
                max_items: 50,
                enable_graph: true,
                enable_history: true,
                enable_web: false,
                graph_depth: 5,
                history_days: 14,
                min_relevance: 0.55,
            },
        ];
        Self { scopes }
    }
}

/// Scope for a level from the global catalog.
pub fn scope_for(level: ComplexityLevel) -> &'static RetrievalScope {
    ScopeCatalog::global().scope_for(level)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_levels_are_ordered() {
        assert!(ComplexityLevel::Simple < ComplexityLevel::Focused);
        assert!(ComplexityLevel::Complex < ComplexityLevel::CrossService);
        let mut shuffled = vec![
            ComplexityLevel::Complex,
            ComplexityLevel::Simple,
            ComplexityLevel::CrossService,
            ComplexityLevel::Moderate,
            ComplexityLevel::Focused,
        ];
        shuffled.sort();
        assert_eq!(shuffled, ComplexityLevel::ALL.to_vec());
    }

    #[test]
    fn test_catalog_covers_every_level() {
        for level in ComplexityLevel::ALL {
            assert_eq!(scope_for(level).level, level);
        }
    }

    #[test]
    fn test_ceilings_widen_with_complexity() {
        let scopes = ScopeCatalog::global().scopes();
        for pair in scopes.windows(2) {
            assert!(pair[1].max_tokens > pair[0].max_tokens);
            assert!(pair[1].min_relevance <= pair[0].min_relevance);
        }
    }

    #[test]
    fn test_representative_figures() {
        let simple = scope_for(ComplexityLevel::Simple);
        assert_eq!(simple.max_tokens, 5_000);
        assert_eq!(simple.max_items, 1);
        assert!(!simple.enable_graph);
        assert!(!simple.enable_history);

        let focused = scope_for(ComplexityLevel::Focused);
        assert_eq!((focused.max_tokens, focused.max_items), (30_000, 5));
        assert_eq!((focused.graph_depth, focused.history_days), (2, 7));

        let complex = scope_for(ComplexityLevel::Complex);
        assert!(complex.enable_web);
        assert_eq!(complex.history_days, 90);

        let cross = scope_for(ComplexityLevel::CrossService);
        assert_eq!((cross.max_tokens, cross.max_items), (150_000, 50));
        assert_eq!(cross.min_relevance, 0.55);
    }

    #[test]
    fn test_includes_excludes_first() {
        let scope = scope_for(ComplexityLevel::Moderate);
        assert!(scope.includes("src/service/auth.rs"));
        assert!(!scope.includes("web/node_modules/lodash/index.js"));
        assert!(!scope.includes("target/dist/bundle.js"));
    }

    #[test]
    fn test_includes_with_include_list() {
        let mut scope = scope_for(ComplexityLevel::Focused).clone();
        scope.include = vec!["src/".to_string()];
        assert!(scope.includes("src/main.rs"));
        assert!(!scope.includes("docs/guide.md"));
        // Exclusion still wins over inclusion.
        assert!(!scope.includes("src/vendor/lib.rs"));
    }

    #[test]
    fn test_hint_returns_adjusted_copy() {
        let base = scope_for(ComplexityLevel::Focused);
        let review = base.with_hint(ScopeHint::SecurityReview);
        assert_eq!(review.max_tokens, 200_000);
        assert_eq!(review.max_items, 100);
        // Catalog entry untouched.
        assert_eq!(scope_for(ComplexityLevel::Focused).max_items, 5);

        assert!(base.with_hint(ScopeHint::WebSearch).enable_web);
        assert_eq!(scope_for(ComplexityLevel::CrossService).with_hint(ScopeHint::Explanation).graph_depth, 2);
    }

    #[test]
    fn test_hint_from_str() {
        assert_eq!("web_search".parse::<ScopeHint>().unwrap(), ScopeHint::WebSearch);
        assert_eq!("security_review".parse::<ScopeHint>().unwrap(), ScopeHint::SecurityReview);
        assert!("deep_dive".parse::<ScopeHint>().is_err());
    }

    #[test]
    fn test_with_excludes_dedupes() {
        let scope = scope_for(ComplexityLevel::Focused).with_excludes(["dist/", "fixtures/"]);
        assert_eq!(scope.exclude.iter().filter(|p| *p == "dist/").count(), 1);
        assert!(!scope.includes("tests/fixtures/big.json"));
    }
}
