use ctxroute_core::classify::classify;
use ctxroute_core::context::{BudgetAllocator, ContextItem, SourceKind, pack};
use ctxroute_core::scope::{ComplexityLevel, ScopeCatalog, ScopeHint, scope_for};
use ctxroute_core::strategy::{AdaptiveEscalator, RetrievalStrategy};
use ctxroute_core::tokens::{CountMethod, TokenCounter};
use ctxroute_core::SecurityFilter;
use proptest::prelude::*;

fn item_strategy() -> impl Strategy<Value = ContextItem> {
    ("[a-z ]{0,600}", 0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(content, relevance, priority)| {
        ContextItem::new(content, "src/lib.rs", SourceKind::Semantic)
            .with_relevance(relevance)
            .with_priority(priority)
    })
}

proptest! {
    #[test]
    fn classification_is_total(q in ".{0,300}") {
        let level = classify(&q);
        prop_assert!(ComplexityLevel::ALL.contains(&level));
    }

    #[test]
    fn pack_never_exceeds_budget(
        items in prop::collection::vec(item_strategy(), 0..20),
        budget in 0usize..2000,
    ) {
        let (packed, used) = pack(items, budget);
        prop_assert!(used <= budget);
        let summed: usize = packed.iter().map(ContextItem::estimated_tokens).sum();
        prop_assert_eq!(summed, used);
    }

    #[test]
    fn pack_is_deterministic(
        items in prop::collection::vec(item_strategy(), 0..12),
        budget in 0usize..1000,
    ) {
        prop_assert_eq!(pack(items.clone(), budget), pack(items, budget));
    }

    #[test]
    fn budget_never_exceeds_window(
        window in 0usize..300_000,
        system in 0usize..50_000,
        query in 0usize..50_000,
        response in 0usize..50_000,
    ) {
        let budget = BudgetAllocator::new(window).allocate(system, query, response);
        prop_assert!(budget.total() <= window);
    }

    #[test]
    fn hybrid_dominates_char_and_word(s in ".{0,400}") {
        let hybrid = TokenCounter::estimate(&s, CountMethod::Hybrid);
        prop_assert!(hybrid >= TokenCounter::estimate(&s, CountMethod::Char));
        prop_assert!(hybrid >= TokenCounter::estimate(&s, CountMethod::Word));
    }

    #[test]
    fn escalation_terminates(quality in 0.0f64..1.0) {
        let escalator = AdaptiveEscalator::new();
        let mut current = RetrievalStrategy::FastLookup;
        let mut steps = 0;
        while let Some(next) = escalator.escalate(current, quality) {
            current = next;
            steps += 1;
            prop_assert!(steps <= 4);
        }
    }

    #[test]
    fn security_filter_never_panics(path in ".{0,200}", content in ".{0,400}") {
        let filter = SecurityFilter::new();
        let _ = filter.is_sensitive_path(&path);
        let _ = filter.contains_credential_markers(&content);
    }
}

#[test]
fn catalog_is_monotone() {
    let scopes = ScopeCatalog::global().scopes();
    for pair in scopes.windows(2) {
        assert!(pair[0].level < pair[1].level);
        assert!(pair[0].max_tokens < pair[1].max_tokens);
        assert!(pair[0].max_items < pair[1].max_items);
        assert!(pair[0].min_relevance >= pair[1].min_relevance);
    }
}

#[test]
fn hints_do_not_touch_catalog() {
    for level in ComplexityLevel::ALL {
        let before = scope_for(level).clone();
        for hint in [ScopeHint::WebSearch, ScopeHint::Explanation, ScopeHint::SecurityReview] {
            let _ = scope_for(level).with_hint(hint);
        }
        assert_eq!(scope_for(level), &before);
    }
}
