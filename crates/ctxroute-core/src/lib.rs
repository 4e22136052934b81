#![deny(unsafe_code)]

//! ctxroute core — query routing and token-budgeted context retrieval.
//!
//! Given a natural-language query against a codebase, the [`Pipeline`]
//! decides how much and what kind of context to retrieve, gathers it from
//! external collaborators, keeps it inside a hard token budget, and scores
//! how good the result was.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future — the standard return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are **not**
/// object-safe. Collaborators are held as `Arc<dyn Trait>`, so their methods
/// return a concrete `Pin<Box<dyn Future>>` instead.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bounded LRU of delivered bundles.
pub mod cache;
/// Query complexity classification.
pub mod classify;
/// External collaborator traits (search, call graph, history, web, indexer).
pub mod collaborators;
/// Token budgets, window packing, and prompt formatting.
pub mod context;
/// Query intent classification.
pub mod intent;
/// Per-query orchestration.
pub mod pipeline;
/// Retrieval quality metrics.
pub mod quality;
/// Retrieval scopes and the static scope catalog.
pub mod scope;
/// Sensitive path and credential filtering.
pub mod security;
/// Strategy routing and adaptive escalation.
pub mod strategy;
/// Token estimation heuristics.
pub mod tokens;

pub use cache::RecencyCache;
pub use classify::ComplexityClassifier;
pub use collaborators::{
    CallGraph, CollaboratorError, HistorySource, Indexer, SearchHit, SemanticSearch, WebSearch,
};
pub use context::{BudgetAllocator, ContextItem, SourceKind, TokenBudget};
pub use intent::{IntentClassifier, QueryIntent};
pub use pipeline::{
    Collaborators, EnhancedContextBundle, Pipeline, PipelineError, RetrievalRequest, Stage,
};
pub use quality::{QualityMetrics, QualityScorer};
pub use scope::{ComplexityLevel, RetrievalScope, ScopeCatalog, ScopeHint};
pub use security::SecurityFilter;
pub use strategy::{
    AdaptiveEscalator, ModelTier, QueryAnalysis, RetrievalPlan, RetrievalStrategy,
    StrategyDecision, StrategySelector,
};
pub use tokens::{CountMethod, TokenCounter};
