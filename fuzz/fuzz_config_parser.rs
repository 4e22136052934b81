//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text to `AppConfig::parse()`. Anything that parses and
//! validates must also yield a usable context window and token budget.

#![no_main]

use ctxroute_core::context::{BudgetAllocator, resolve_context_window};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ctxroute_config::AppConfig::parse(s) {
        let window = resolve_context_window(&config.model.name, config.model.context_window);
        let budget = BudgetAllocator::new(window).allocate(0, 0, config.model.response_target);
        assert!(budget.total() <= window);
    }
});
