//! Query intent classification.
//!
//! Used when a caller does not say what it wants. Specific phrasings are
//! matched first; otherwise keyword counts pick between external information,
//! a codebase search, and general chat.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    ExplainCode,
    WriteCode,
    FixCode,
    RefactorCode,
    SearchCodebase,
    ExternalInfo,
    Comparison,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::ExplainCode => "explain_code",
            QueryIntent::WriteCode => "write_code",
            QueryIntent::FixCode => "fix_code",
            QueryIntent::RefactorCode => "refactor_code",
            QueryIntent::SearchCodebase => "search_codebase",
            QueryIntent::ExternalInfo => "external_info",
            QueryIntent::Comparison => "comparison",
            QueryIntent::General => "general",
        }
    }

    /// Whether this intent needs material from outside the codebase.
    pub fn wants_external(&self) -> bool {
        matches!(self, QueryIntent::ExternalInfo | QueryIntent::Comparison)
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown intent label.
#[derive(Debug, thiserror::Error)]
#[error("unknown query intent: {0}")]
pub struct UnknownIntent(pub String);

impl FromStr for QueryIntent {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "explain_code" | "explain" => Ok(QueryIntent::ExplainCode),
            "write_code" | "write" => Ok(QueryIntent::WriteCode),
            "fix_code" | "fix" => Ok(QueryIntent::FixCode),
            "refactor_code" | "refactor" => Ok(QueryIntent::RefactorCode),
            "search_codebase" | "search" => Ok(QueryIntent::SearchCodebase),
            "external_info" | "external" => Ok(QueryIntent::ExternalInfo),
            "comparison" | "compare" => Ok(QueryIntent::Comparison),
            "general" => Ok(QueryIntent::General),
            other => Err(UnknownIntent(other.to_string())),
        }
    }
}

const EXTERNAL_KEYWORDS: [&str; 13] = [
    "latest",
    "current",
    "version",
    "compare",
    "vs",
    "versus",
    "difference between",
    "best practice",
    "how to install",
    "documentation",
    "official",
    "release",
    "alternative",
];

const CODE_KEYWORDS: [&str; 14] = [
    "this code",
    "this file",
    "this function",
    "this class",
    "our code",
    "where is",
    "how does",
    "explain",
    "refactor",
    "fix",
    "bug",
    "error",
    "implement",
    "add feature",
];

const INTENT_RULES: [(&str, QueryIntent, f64); 6] = [
    (r"(explain|what does|how does).*(this|the)\s+(code|function|class)", QueryIntent::ExplainCode, 0.9),
    (r"(fix|debug|error|bug|issue|problem|broken)", QueryIntent::FixCode, 0.85),
    (r"(refactor|improve|optimize|clean up|simplify)", QueryIntent::RefactorCode, 0.85),
    (r"(write|create|implement|add|generate|build)\s+", QueryIntent::WriteCode, 0.8),
    (r"(where|find|search|locate|show me)\s+", QueryIntent::SearchCodebase, 0.85),
    (r"(compare|vs|versus|difference|better|choose)", QueryIntent::Comparison, 0.8),
];

// Rules that fail to compile are skipped.
static RULES: LazyLock<Vec<(Regex, QueryIntent, f64)>> = LazyLock::new(|| {
    INTENT_RULES
        .iter()
        .filter_map(|(p, intent, confidence)| Regex::new(p).ok().map(|re| (re, *intent, *confidence)))
        .collect()
});

/// Classifies a query into a [`QueryIntent`] with a confidence in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query.
    pub fn classify(&self, query: &str) -> (QueryIntent, f64) {
        let q = query.to_lowercase();

        if let Some((_, intent, confidence)) = RULES.iter().find(|(re, _, _)| re.is_match(&q)) {
            return (*intent, *confidence);
        }

        let external = EXTERNAL_KEYWORDS.iter().filter(|kw| q.contains(*kw)).count();
        let code = CODE_KEYWORDS.iter().filter(|kw| q.contains(*kw)).count();

        if external > code && external > 0 {
            (QueryIntent::ExternalInfo, 0.6)
        } else if code > 0 {
            (QueryIntent::SearchCodebase, 0.6)
        } else {
            (QueryIntent::General, 0.5)
        }
    }
}
