//! Token estimation heuristics.
//!
//! No tokenizer is consulted: counts are approximations good enough for
//! budgeting. One token is taken as roughly four characters or three quarters
//! of a word. All conversions floor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Characters per token for the `char` heuristic.
pub const CHARS_PER_TOKEN: usize = 4;

/// Words per token for the `word` heuristic.
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Extra tokens charged per line of source code.
pub const CODE_TOKENS_PER_LINE: usize = 8;

/// Which heuristic to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMethod {
    /// `chars / 4`.
    Char,
    /// `words / 0.75`.
    Word,
    /// The larger of the two.
    #[default]
    Hybrid,
}

impl fmt::Display for CountMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountMethod::Char => write!(f, "char"),
            CountMethod::Word => write!(f, "word"),
            CountMethod::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Error for an unrecognised method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token counting method: {0:?} (expected char, word or hybrid)")]
pub struct UnknownCountMethod(pub String);

impl FromStr for CountMethod {
    type Err = UnknownCountMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "char" => Ok(CountMethod::Char),
            "word" => Ok(CountMethod::Word),
            "hybrid" => Ok(CountMethod::Hybrid),
            other => Err(UnknownCountMethod(other.to_string())),
        }
    }
}

/// Stateless token estimator.
pub struct TokenCounter;

impl TokenCounter {
    /// Estimate the token count of `text` with the given heuristic.
    pub fn estimate(text: &str, method: CountMethod) -> usize {
        if text.is_empty() {
            return 0;
        }
        match method {
            CountMethod::Char => char_estimate(text),
            CountMethod::Word => word_estimate(text),
            CountMethod::Hybrid => char_estimate(text).max(word_estimate(text)),
        }
    }

    /// Estimate for source code, which tokenizes denser than prose.
    pub fn estimate_code(code: &str) -> usize {
        if code.is_empty() {
            return 0;
        }
        let lines = code.split('\n').count();
        lines * CODE_TOKENS_PER_LINE + char_estimate(code)
    }
}

fn char_estimate(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

fn word_estimate(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 / WORDS_PER_TOKEN) as usize
}
