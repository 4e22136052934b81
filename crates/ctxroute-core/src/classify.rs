//! Query complexity classification.
//!
//! A query is run through an ordered list of rules, broadest first; the first
//! rule that fires decides the level. Queries no rule recognises are sized by
//! word count. Classification is total and never fails.

use std::sync::LazyLock;

use regex::RegexSet;

use crate::scope::ComplexityLevel;

const CROSS_SERVICE_PATTERNS: [&str; 6] = [
    r"(across|between) (services|repos|modules)",
    r"(multiple|different) (services|components)",
    r"(service.*service|inter-service)",
    r"(distributed|microservice)",
    r"(api.*gateway|service mesh)",
    r"(transaction|saga|orchestration)",
];

const ARCHITECTURAL_PATTERNS: [&str; 7] = [
    r"(architecture|design|system)",
    r"(refactor|redesign) (the|this)",
    r"dependency|dependencies|import",
    r"(flow|workflow|process)",
    r"(scale|performance|optimization)",
    r"(migration|upgrade)",
    r"(integration|connect|integrate)",
];

const FOCUSED_PATTERNS: [&str; 6] = [
    r"(fix|debug|error|bug|issue)",
    r"(implement|add|create) (feature|function)",
    r"(refactor|improve|optimize) (this|the)",
    r"(write|generate) (code|function)",
    r"(test|unit test)",
    r"(this|this file|this code)",
];

const SIMPLE_PATTERNS: [&str; 7] = [
    r"^what is [\w\.]+\?$",
    r"^show (?:me )?[\w\. ]+$",
    r"^(where|find) (is|are) [\w\.]+",
    r"^what does [\w\.]+ (do|mean)",
    r"^(how to|can you) [\w ]+\?$",
    r"^api\s+(docs|documentation)",
    r"^function signature",
];

// Unbuildable sets match nothing, so classification falls through to word count.
static CROSS_SERVICE: LazyLock<Option<RegexSet>> =
    LazyLock::new(|| RegexSet::new(CROSS_SERVICE_PATTERNS).ok());
static ARCHITECTURAL: LazyLock<Option<RegexSet>> =
    LazyLock::new(|| RegexSet::new(ARCHITECTURAL_PATTERNS).ok());
static FOCUSED: LazyLock<Option<RegexSet>> = LazyLock::new(|| RegexSet::new(FOCUSED_PATTERNS).ok());
static SIMPLE: LazyLock<Option<RegexSet>> = LazyLock::new(|| RegexSet::new(SIMPLE_PATTERNS).ok());

// Matched anywhere in the query, so "install" counts as "all".
const TOTALITY_WORDS: [&str; 3] = ["entire", "whole", "all"];
const MULTI_TARGET_WORDS: [&str; 4] = ["multiple", "different", "both", "files"];

fn any_match(set: &LazyLock<Option<RegexSet>>, text: &str) -> bool {
    set.as_ref().is_some_and(|s| s.is_match(text))
}

fn mentions_any(words: &[&str], text: &str) -> bool {
    words.iter().any(|word| text.contains(word))
}

/// A classification rule over the lower-cased query.
type Rule = fn(&str) -> Option<ComplexityLevel>;

fn cross_service(q: &str) -> Option<ComplexityLevel> {
    any_match(&CROSS_SERVICE, q).then_some(ComplexityLevel::CrossService)
}

fn architectural(q: &str) -> Option<ComplexityLevel> {
    if !any_match(&ARCHITECTURAL, q) {
        return None;
    }
    Some(if mentions_any(&TOTALITY_WORDS, q) {
        ComplexityLevel::Complex
    } else {
        ComplexityLevel::Moderate
    })
}

fn focused(q: &str) -> Option<ComplexityLevel> {
    if !any_match(&FOCUSED, q) {
        return None;
    }
    Some(if mentions_any(&MULTI_TARGET_WORDS, q) {
        ComplexityLevel::Moderate
    } else {
        ComplexityLevel::Focused
    })
}

fn simple_lookup(q: &str) -> Option<ComplexityLevel> {
    any_match(&SIMPLE, q).then_some(ComplexityLevel::Simple)
}

const RULES: [Rule; 4] = [cross_service, architectural, focused, simple_lookup];

/// Size a query no rule recognised.
fn by_word_count(q: &str) -> ComplexityLevel {
    match q.split_whitespace().count() {
        0..5 => ComplexityLevel::Simple,
        5..15 => ComplexityLevel::Focused,
        15..30 => ComplexityLevel::Moderate,
        _ => ComplexityLevel::Complex,
    }
}

/// Maps query text to a [`ComplexityLevel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityClassifier;

impl ComplexityClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query. Total: every input yields a level.
    pub fn classify(&self, query: &str) -> ComplexityLevel {
        classify(query)
    }
}

/// Classify a query with the built-in rules.
pub fn classify(query: &str) -> ComplexityLevel {
    let q = query.trim().to_lowercase();
    RULES
        .iter()
        .find_map(|rule| rule(&q))
        .unwrap_or_else(|| by_word_count(&q))
}
