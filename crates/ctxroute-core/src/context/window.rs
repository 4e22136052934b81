//! Context window packing — rank candidates and fit them into a token budget.
//!
//! Candidates are ranked by `0.7 × relevance + 0.3 × priority` and accepted
//! greedily. An item that does not fit whole may be truncated to the remaining
//! space, provided enough of it survives to be useful. The packed total never
//! exceeds the budget.

use serde::{Deserialize, Serialize};

use crate::tokens::{CountMethod, TokenCounter};

/// Weight of relevance in the ranking score.
pub const RELEVANCE_WEIGHT: f64 = 0.7;

/// Weight of priority in the ranking score.
pub const PRIORITY_WEIGHT: f64 = 0.3;

/// Fraction of the proportional fitting length kept when truncating.
pub const TRUNCATION_SAFETY: f64 = 0.95;

/// Truncations shorter than this many characters are dropped instead.
pub const MIN_TRUNCATED_CHARS: usize = 100;

/// Appended to truncated content.
pub const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

/// Where a context item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Semantic search hit over the code index.
    Semantic,
    /// Call-graph summary.
    Graph,
    /// Version-control history summary.
    History,
    /// Web search results.
    Web,
    /// Anything else.
    Other,
}

impl SourceKind {
    /// Whether `source` names a file in the repository.
    pub fn is_file_backed(self) -> bool {
        matches!(self, SourceKind::Semantic | SourceKind::Other)
    }
}

/// One candidate unit of retrieved material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// What kind of context this is.
    pub kind: SourceKind,
    /// The text content.
    pub content: String,
    /// Source identifier (file path, or e.g. "call_graph_analysis").
    pub source: String,
    /// Relevance to the query, in [0, 1].
    pub relevance: f64,
    /// Importance of the source kind, in [0, 1].
    pub priority: f64,
    /// First line of the excerpt in its file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    /// Set when the packer shortened the content.
    #[serde(default)]
    pub truncated: bool,
}

impl ContextItem {
    /// Create an item with zero relevance and neutral priority.
    pub fn new(content: impl Into<String>, source: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            kind,
            content: content.into(),
            source: source.into(),
            relevance: 0.0,
            priority: 0.5,
            start_line: None,
            truncated: false,
        }
    }

    /// Set relevance, clamped into [0, 1].
    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = unit(relevance);
        self
    }

    /// Set priority, clamped into [0, 1].
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = unit(priority);
        self
    }

    /// Set the starting line number.
    pub fn with_start_line(mut self, line: u32) -> Self {
        self.start_line = Some(line);
        self
    }

    /// Ranking score used for packing order.
    pub fn rank_score(&self) -> f64 {
        RELEVANCE_WEIGHT * self.relevance + PRIORITY_WEIGHT * self.priority
    }

    /// Hybrid token estimate of the content.
    pub fn estimated_tokens(&self) -> usize {
        TokenCounter::estimate(&self.content, CountMethod::Hybrid)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// A token-bounded window of packed context.
pub struct ContextWindow {
    /// Total token budget for packed context.
    budget: usize,
    /// Items packed into the window, in acceptance order.
    items: Vec<ContextItem>,
    /// Total tokens used.
    used_tokens: usize,
}

impl ContextWindow {
    /// Create an empty window with the given budget.
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            items: Vec::new(),
            used_tokens: 0,
        }
    }

    /// Tokens still free.
    pub fn available(&self) -> usize {
        self.budget.saturating_sub(self.used_tokens)
    }

    /// Total tokens used by packed context.
    pub fn used(&self) -> usize {
        self.used_tokens
    }

    /// Total budget.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Number of packed items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Packed items in acceptance order.
    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    /// Consume the window, returning the packed items and tokens used.
    pub fn into_parts(self) -> (Vec<ContextItem>, usize) {
        (self.items, self.used_tokens)
    }

    /// Add an item whole if it fits.
    ///
    /// Returns `true` if the item was added, `false` if it didn't fit.
    pub fn add(&mut self, item: ContextItem) -> bool {
        let tokens = item.estimated_tokens();
        if tokens <= self.available() {
            self.used_tokens += tokens;
            self.items.push(item);
            true
        } else {
            false
        }
    }

    /// Add an item whole, or a truncated copy of it, or nothing.
    ///
    /// Returns `true` if anything was added.
    pub fn add_or_truncate(&mut self, item: ContextItem) -> bool {
        if item.estimated_tokens() <= self.available() {
            return self.add(item);
        }
        if self.available() == 0 {
            return false;
        }
        match truncate_to_fit(&item, self.available()) {
            Some(truncated) => {
                tracing::trace!(
                    source = %truncated.source,
                    chars = truncated.content.chars().count(),
                    "Truncated context item to fit window"
                );
                self.add(truncated)
            }
            None => false,
        }
    }

    /// Rank `items` and pack them greedily.
    ///
    /// Ties keep their input order. Returns the number of items packed.
    pub fn pack(&mut self, mut items: Vec<ContextItem>) -> usize {
        items.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
        let mut packed = 0;
        for item in items {
            if self.add_or_truncate(item) {
                packed += 1;
            }
        }
        packed
    }
}

/// Pack `items` into `budget` tokens, returning the selection and tokens used.
pub fn pack(items: Vec<ContextItem>, budget: usize) -> (Vec<ContextItem>, usize) {
    let mut window = ContextWindow::new(budget);
    window.pack(items);
    window.into_parts()
}

/// Shorten `item` so its hybrid estimate fits in `available` tokens.
fn truncate_to_fit(item: &ContextItem, available: usize) -> Option<ContextItem> {
    let estimated = item.estimated_tokens();
    if item.content.is_empty() || estimated == 0 {
        return None;
    }
    let chars = item.content.chars().count();
    let ratio = available as f64 / estimated as f64;
    let mut keep = (chars as f64 * ratio * TRUNCATION_SAFETY) as usize;

    // The marker can tip a borderline cut over; shrink until it fits.
    while keep >= MIN_TRUNCATED_CHARS {
        let mut content: String = item.content.chars().take(keep).collect();
        content.push_str(TRUNCATION_MARKER);
        if TokenCounter::estimate(&content, CountMethod::Hybrid) <= available {
            return Some(ContextItem {
                content,
                truncated: true,
                ..item.clone()
            });
        }
        keep = keep * 9 / 10;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(content: &str, relevance: f64, priority: f64) -> ContextItem {
        ContextItem::new(content, "src/lib.rs", SourceKind::Semantic)
            .with_relevance(relevance)
            .with_priority(priority)
    }

    #[test]
    fn test_empty_window() {
        let window = ContextWindow::new(4000);
        assert_eq!(window.available(), 4000);
        assert_eq!(window.used(), 0);
        assert_eq!(window.item_count(), 0);
    }

    #[test]
    fn test_add_item() {
        let mut window = ContextWindow::new(4000);
        assert!(window.add(item("fn parse_config() -> Config { todo!() }", 0.9, 1.0)));
        assert!(window.used() > 0);
        assert_eq!(window.item_count(), 1);
    }

    #[test]
    fn test_budget_exhausted() {
        let mut window = ContextWindow::new(50);
        // 400 chars ≈ 100 tokens
        assert!(!window.add(item(&"x".repeat(400), 0.9, 1.0)));
        assert_eq!(window.item_count(), 0);
    }

    #[test]
    fn test_clamps_scores() {
        let it = item("a", 1.7, -0.2);
        assert_eq!(it.relevance, 1.0);
        assert_eq!(it.priority, 0.0);
        assert_eq!(item("a", f64::NAN, 0.5).relevance, 0.0);
    }

    #[test]
    fn test_pack_orders_by_rank() {
        let items = vec![
            item("low relevance", 0.2, 0.5),
            item("high relevance", 0.9, 1.0),
            item("mid relevance", 0.6, 0.7),
        ];
        let (packed, _) = pack(items, 1000);
        let order: Vec<&str> = packed.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(order, vec!["high relevance", "mid relevance", "low relevance"]);
    }

    #[test]
    fn test_pack_ties_keep_input_order() {
        let items = vec![item("first", 0.5, 0.5), item("second", 0.5, 0.5), item("third", 0.5, 0.5)];
        let (packed, _) = pack(items, 1000);
        let order: Vec<&str> = packed.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_pack_all_fit_is_unmodified() {
        let items = vec![
            item("fn a() {}", 0.9, 1.0),
            item("struct B;", 0.8, 1.0),
            item("impl B { fn c(&self) {} }", 0.7, 1.0),
        ];
        let expected: usize = items.iter().map(ContextItem::estimated_tokens).sum();
        let (packed, used) = pack(items.clone(), 10_000);
        assert_eq!(packed, items);
        assert_eq!(used, expected);
    }

    #[test]
    fn test_truncates_oversized_item() {
        let big = "word ".repeat(1000);
        let (packed, used) = pack(vec![item(&big, 0.9, 1.0)], 100);
        assert_eq!(packed.len(), 1);
        assert!(packed[0].truncated);
        assert!(packed[0].content.ends_with(TRUNCATION_MARKER));
        assert!(used <= 100);
        assert_eq!(used, packed[0].estimated_tokens());
    }

    #[test]
    fn test_skips_truncation_below_floor() {
        let big = "word ".repeat(1000);
        let (packed, used) = pack(vec![item(&big, 0.9, 1.0)], 20);
        assert!(packed.is_empty());
        assert_eq!(used, 0);
    }

    #[test]
    fn test_later_small_items_still_fill_space() {
        let big = "word ".repeat(1000);
        let items = vec![item(&big, 0.95, 1.0), item("fn small() {}", 0.1, 0.1)];
        let (packed, used) = pack(items, 20);
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].content, "fn small() {}");
        assert!(used <= 20);
    }

    #[test]
    fn test_pack_is_deterministic() {
        let items: Vec<ContextItem> = (0..20)
            .map(|i| item(&"token ".repeat(i * 13 + 5), (i % 7) as f64 / 7.0, (i % 3) as f64 / 3.0))
            .collect();
        let first = pack(items.clone(), 300);
        let second = pack(items, 300);
        assert_eq!(first, second);
        assert!(first.1 <= 300);
    }

    #[test]
    fn test_zero_budget_packs_nothing() {
        let (packed, used) = pack(vec![item("fn a() {}", 1.0, 1.0)], 0);
        assert!(packed.is_empty());
        assert_eq!(used, 0);
    }
}
