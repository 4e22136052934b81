//! Fuzz target for query classification and filtering.
//!
//! Run with: cargo +nightly fuzz run fuzz_classify
//!
//! Splits the input into a query and a path, then runs both classifiers, the
//! security filter and the packer over them. None of these may panic, and
//! packing must stay inside its budget.

#![no_main]

use ctxroute_core::context::{ContextItem, SourceKind, pack};
use ctxroute_core::{IntentClassifier, SecurityFilter, classify::classify};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let budget = data[0] as usize * 4;
    let text = String::from_utf8_lossy(&data[1..]);
    let (query, path) = text.split_once('\n').unwrap_or((&text, "src/lib.rs"));

    let _ = classify(query);
    let _ = IntentClassifier::new().classify(query);

    let filter = SecurityFilter::new();
    let item = ContextItem::new(query, path, SourceKind::Semantic).with_relevance(0.9);
    let _ = filter.is_sensitive(&item);

    let (_, used) = pack(vec![item], budget);
    assert!(used <= budget);
});
