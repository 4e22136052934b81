//! Render packed context as the text block handed to the model.

use std::fmt::Write;

use super::window::ContextItem;

/// Heading of the formatted block.
pub const CONTEXT_HEADER: &str = "=== RETRIEVED CONTEXT ===";

const MAX_RULE_WIDTH: usize = 80;

/// Format items in order, numbered from 1.
///
/// Excerpts with a known start line are line-numbered; truncated items and
/// synthetic summaries are emitted verbatim.
pub fn format_for_model(items: &[ContextItem]) -> String {
    let mut out = String::from(CONTEXT_HEADER);
    out.push('\n');

    for (idx, item) in items.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(out, "\n[{}] {} (relevance: {:.2})\n", idx + 1, item.source, item.relevance);
        let width = (item.source.chars().count() + 20).min(MAX_RULE_WIDTH);
        out.push_str(&"-".repeat(width));
        out.push('\n');

        match item.start_line {
            Some(start) if !item.truncated => {
                for (offset, line) in item.content.split('\n').enumerate() {
                    let _ = writeln!(out, "{:4} | {}", start as usize + offset, line);
                }
            }
            _ => {
                out.push_str(&item.content);
                out.push('\n');
            }
        }
    }
    out
}
