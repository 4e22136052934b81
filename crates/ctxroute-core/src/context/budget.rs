//! Token budget allocation across a model's context window.
//!
//! Fixed overheads are carved out of the window first; whatever remains is
//! available for retrieved context. Percentages are floored.

use serde::{Deserialize, Serialize};

/// Safety margin, percent of the window.
pub const SAFETY_MARGIN_PCT: usize = 5;

/// Reasoning reserve, percent of the window.
pub const REASONING_RESERVE_PCT: usize = 10;

/// Minimum response reserve, percent of the window.
pub const RESPONSE_RESERVE_PCT: usize = 15;

/// Window assumed for models missing from the lookup table.
pub const DEFAULT_CONTEXT_WINDOW: usize = 4096;

/// Partition of a context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenBudget {
    pub system_prompt: usize,
    pub query: usize,
    pub reasoning_reserve: usize,
    pub response_reserve: usize,
    pub safety_margin: usize,
    /// Tokens left for retrieved context. Never negative.
    pub remaining_context: usize,
}

impl TokenBudget {
    /// Sum of all six slices.
    pub fn total(&self) -> usize {
        self.system_prompt
            + self.query
            + self.reasoning_reserve
            + self.response_reserve
            + self.safety_margin
            + self.remaining_context
    }
}

/// Splits a fixed context window into a [`TokenBudget`].
#[derive(Debug, Clone, Copy)]
pub struct BudgetAllocator {
    context_window: usize,
}

impl BudgetAllocator {
    /// Allocator for a window of `context_window` tokens.
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    /// Allocator for a named model, using the lookup table.
    pub fn for_model(model: &str) -> Self {
        Self::new(resolve_context_window(model, None))
    }

    /// Window size in tokens.
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Allocate the window.
    ///
    /// Overheads that would push the sum past the window are clamped in the
    /// order response, system prompt, query.
    pub fn allocate(
        &self,
        system_prompt_tokens: usize,
        query_tokens: usize,
        response_target: usize,
    ) -> TokenBudget {
        let window = self.context_window;
        let safety_margin = percent_of(window, SAFETY_MARGIN_PCT);
        let reasoning_reserve = percent_of(window, REASONING_RESERVE_PCT);
        let mut left = window - safety_margin - reasoning_reserve;

        let wanted_response = response_target.max(percent_of(window, RESPONSE_RESERVE_PCT));
        let response_reserve = wanted_response.min(left);
        left -= response_reserve;

        let system_prompt = system_prompt_tokens.min(left);
        left -= system_prompt;
        let query = query_tokens.min(left);
        left -= query;

        if response_reserve < wanted_response
            || system_prompt < system_prompt_tokens
            || query < query_tokens
        {
            tracing::warn!(
                window,
                system_prompt_tokens,
                query_tokens,
                response_target,
                "Fixed overheads exceed the context window; slices clamped"
            );
        }

        TokenBudget {
            system_prompt,
            query,
            reasoning_reserve,
            response_reserve,
            safety_margin,
            remaining_context: left,
        }
    }
}

/// `pct` percent of `window`, floored, without overflowing for any window.
fn percent_of(window: usize, pct: usize) -> usize {
    window / 100 * pct + window % 100 * pct / 100
}

/// Known model families and their context windows, most specific first.
const MODEL_WINDOWS: &[(&str, usize)] = &[
    ("gemini-1.5", 2_000_000),
    ("gpt-4.1", 1_048_576),
    ("claude", 200_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4", 128_000),
    ("mixtral", 32_768),
    ("70b", 32_768),
    ("32b", 32_768),
    ("13b", 8_192),
    ("14b", 8_192),
    ("mistral", 8_192),
    ("7b", 4_096),
    ("8b", 8_192),
];

/// Context window for a model name, if its family is known.
pub fn context_window_for(model: &str) -> Option<usize> {
    let lower = model.to_lowercase();
    MODEL_WINDOWS
        .iter()
        .find(|(family, _)| lower.contains(family))
        .map(|(_, window)| *window)
}

/// Resolve the window to budget against.
///
/// An explicit override wins; otherwise the lookup table is used; unknown
/// models fall back to [`DEFAULT_CONTEXT_WINDOW`] with a warning.
pub fn resolve_context_window(model: &str, explicit: Option<usize>) -> usize {
    if let Some(window) = explicit {
        return window;
    }
    match context_window_for(model) {
        Some(window) => window,
        None => {
            tracing::warn!(
                model,
                fallback = DEFAULT_CONTEXT_WINDOW,
                "Unknown model; set model.context_window to silence this"
            );
            DEFAULT_CONTEXT_WINDOW
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reference_allocation() {
        let budget = BudgetAllocator::new(4096).allocate(100, 50, 1000);
        assert_eq!(
            budget,
            TokenBudget {
                system_prompt: 100,
                query: 50,
                reasoning_reserve: 409,
                response_reserve: 1000,
                safety_margin: 204,
                remaining_context: 2333,
            }
        );
        assert_eq!(budget.total(), 4096);
    }

    #[test]
    fn test_response_reserve_uses_percentage_floor() {
        let budget = BudgetAllocator::new(100_000).allocate(500, 20, 1000);
        assert_eq!(budget.response_reserve, 15_000);
        assert_eq!(budget.safety_margin, 5_000);
        assert_eq!(budget.reasoning_reserve, 10_000);
        assert_eq!(budget.remaining_context, 100_000 - 5_000 - 10_000 - 15_000 - 520);
    }

    #[test]
    fn test_remaining_clamped_at_zero() {
        let budget = BudgetAllocator::new(4096).allocate(3000, 500, 1000);
        assert_eq!(budget.remaining_context, 0);
        assert!(budget.total() <= 4096);
        assert_eq!(budget.system_prompt, 2483);
        assert_eq!(budget.query, 0);
    }

    #[test]
    fn test_huge_response_target_is_clamped() {
        let budget = BudgetAllocator::new(1000).allocate(10, 10, 50_000);
        assert_eq!(budget.response_reserve, 1000 - 50 - 100);
        assert_eq!(budget.remaining_context, 0);
        assert!(budget.total() <= 1000);
    }

    #[test]
    fn test_zero_window() {
        let budget = BudgetAllocator::new(0).allocate(10, 10, 10);
        assert_eq!(budget.total(), 0);
    }

    #[test]
    fn test_huge_windows_do_not_overflow() {
        for window in [usize::MAX, 9_000_000_000_000_000_000, usize::MAX / 7] {
            let budget = BudgetAllocator::new(window).allocate(100, 50, 1000);
            assert_eq!(budget.total(), window);
            assert_eq!(budget.safety_margin, percent_of(window, SAFETY_MARGIN_PCT));
            assert!(budget.safety_margin <= window / 20);
            assert!(budget.remaining_context > window / 2);
        }
    }

    #[test]
    fn test_percent_of_matches_floor() {
        for window in [0, 1, 99, 100, 4096, 123_457] {
            assert_eq!(percent_of(window, 15), window * 15 / 100);
        }
    }

    #[test]
    fn test_model_lookup() {
        assert_eq!(context_window_for("claude-sonnet-4-20250514"), Some(200_000));
        assert_eq!(context_window_for("gpt-4o"), Some(128_000));
        assert_eq!(context_window_for("gpt-4.1-mini"), Some(1_048_576));
        assert_eq!(context_window_for("Llama-3-70B-instruct"), Some(32_768));
        assert_eq!(context_window_for("qwen2.5-coder:7b"), Some(4_096));
        assert_eq!(context_window_for("qwen2.5-coder:14b"), Some(8_192));
        assert_eq!(context_window_for("mystery-model"), None);
    }

    #[test]
    fn test_resolve_prefers_override_then_falls_back() {
        assert_eq!(resolve_context_window("claude-3", Some(50_000)), 50_000);
        assert_eq!(resolve_context_window("claude-3", None), 200_000);
        assert_eq!(resolve_context_window("mystery-model", None), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(BudgetAllocator::for_model("mystery-model").context_window(), 4096);
    }
}
