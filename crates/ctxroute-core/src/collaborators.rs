//! Collaborator traits — the external services the pipeline retrieves from.
//!
//! Embedding search, call-graph analysis, history mining, web search and
//! indexing all live outside this crate. The pipeline only sees these narrow
//! contracts, held as `Arc<dyn Trait>`, so every method returns a
//! [`BoxFuture`] for object safety.
//!
//! Failures never abort a query: the pipeline logs them and carries on with
//! whatever the other collaborators returned.

use serde::{Deserialize, Serialize};

use crate::BoxFuture;

/// Errors from collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator request failed: {0}")]
    Request(String),

    #[error("index not ready: {0}")]
    NotIndexed(String),

    #[error("timeout")]
    Timeout,
}

/// One hit from the semantic search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Relevance in [0, 1], directly comparable to scope thresholds.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl SearchHit {
    pub fn new(content: impl Into<String>, path: impl Into<String>, score: f64) -> Self {
        Self {
            content: content.into(),
            path: path.into(),
            start_line: 1,
            end_line: 1,
            score,
            symbol: None,
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = start;
        self.end_line = end;
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

/// Embedding-backed nearest-neighbour search over the code index.
pub trait SemanticSearch: Send + Sync {
    /// Up to `limit` hits for `query`, best first.
    fn search<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>, CollaboratorError>>;
}

/// Static call-graph queries.
pub trait CallGraph: Send + Sync {
    fn callers_of<'a>(
        &'a self,
        symbol: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, Result<Vec<String>, CollaboratorError>>;

    fn callees_of<'a>(
        &'a self,
        symbol: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, Result<Vec<String>, CollaboratorError>>;
}

/// Recent version-control activity.
pub trait HistorySource: Send + Sync {
    /// A formatted summary of recent changes touching `paths`.
    ///
    /// An empty `paths` slice means the whole repository.
    fn recent_context<'a>(
        &'a self,
        paths: &'a [String],
        lookback_days: u32,
        limit: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>>;
}

/// External web search.
pub trait WebSearch: Send + Sync {
    /// A formatted block of up to `limit` results.
    fn search_formatted<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>>;
}

/// Builds the index the semantic search runs over.
///
/// Invoked outside the per-query path.
pub trait Indexer: Send + Sync {
    /// Index the codebase, re-indexing everything if `force` is set.
    ///
    /// Returns the number of units now indexed.
    fn index(&self, force: bool) -> BoxFuture<'_, Result<usize, CollaboratorError>>;

    /// Units currently indexed.
    fn indexed_units(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(CollaboratorError::Timeout.to_string(), "timeout");
        assert_eq!(
            CollaboratorError::Unavailable("vector store".into()).to_string(),
            "collaborator unavailable: vector store"
        );
    }

    #[test]
    fn test_search_hit_builder() {
        let hit = SearchHit::new("fn a() {}", "src/a.rs", 0.9)
            .with_lines(10, 12)
            .with_symbol("a");
        assert_eq!(hit.start_line, 10);
        assert_eq!(hit.end_line, 12);
        assert_eq!(hit.symbol.as_deref(), Some("a"));
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn _assert(
            _: &dyn SemanticSearch,
            _: &dyn CallGraph,
            _: &dyn HistorySource,
            _: &dyn WebSearch,
            _: &dyn Indexer,
        ) {
        }
    }
}
