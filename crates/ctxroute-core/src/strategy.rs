//! Retrieval strategy routing and adaptive escalation.
//!
//! Each complexity level maps to a retrieval strategy, a latency estimate, a
//! recommended model tier, and flags for web lookups and parallel retrieval.
//! When a retrieval scores poorly, [`AdaptiveEscalator`] names the next, more
//! expensive strategy to try.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::ComplexityClassifier;
use crate::intent::QueryIntent;
use crate::scope::{ComplexityLevel, RetrievalScope, scope_for};

/// Quality at or above which a retrieval is good enough.
pub const ESCALATION_THRESHOLD: f64 = 0.6;

/// How much context-gathering work to perform, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Direct lookup, no graph or history.
    FastLookup,
    /// Vector search only.
    SemanticSearch,
    /// Vector search plus call graph.
    SemanticPlusGraph,
    /// Every context source.
    FullAnalysis,
    /// Multi-service analysis.
    CrossService,
}

impl RetrievalStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            RetrievalStrategy::FastLookup => "fast_lookup",
            RetrievalStrategy::SemanticSearch => "semantic_search",
            RetrievalStrategy::SemanticPlusGraph => "semantic_plus_graph",
            RetrievalStrategy::FullAnalysis => "full_analysis",
            RetrievalStrategy::CrossService => "cross_service",
        }
    }

    /// Expected latency in milliseconds.
    pub const fn latency_ms(self) -> u64 {
        match self {
            RetrievalStrategy::FastLookup => 50,
            RetrievalStrategy::SemanticSearch => 1000,
            RetrievalStrategy::SemanticPlusGraph => 3000,
            RetrievalStrategy::FullAnalysis => 5000,
            RetrievalStrategy::CrossService => 8000,
        }
    }

    /// The next more expensive strategy, if any.
    pub const fn successor(self) -> Option<RetrievalStrategy> {
        match self {
            RetrievalStrategy::FastLookup => Some(RetrievalStrategy::SemanticSearch),
            RetrievalStrategy::SemanticSearch => Some(RetrievalStrategy::SemanticPlusGraph),
            RetrievalStrategy::SemanticPlusGraph => Some(RetrievalStrategy::FullAnalysis),
            RetrievalStrategy::FullAnalysis => Some(RetrievalStrategy::CrossService),
            RetrievalStrategy::CrossService => None,
        }
    }

    /// The complexity level whose scope this strategy retrieves with.
    pub const fn level(self) -> ComplexityLevel {
        match self {
            RetrievalStrategy::FastLookup => ComplexityLevel::Simple,
            RetrievalStrategy::SemanticSearch => ComplexityLevel::Focused,
            RetrievalStrategy::SemanticPlusGraph => ComplexityLevel::Moderate,
            RetrievalStrategy::FullAnalysis => ComplexityLevel::Complex,
            RetrievalStrategy::CrossService => ComplexityLevel::CrossService,
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended model size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Small,
    Medium,
    Large,
}

impl ModelTier {
    pub const fn for_level(level: ComplexityLevel) -> ModelTier {
        match level {
            ComplexityLevel::Simple | ComplexityLevel::Focused => ModelTier::Small,
            ComplexityLevel::Moderate => ModelTier::Medium,
            ComplexityLevel::Complex | ComplexityLevel::CrossService => ModelTier::Large,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ModelTier::Small => "small",
            ModelTier::Medium => "medium",
            ModelTier::Large => "large",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`StrategySelector::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: RetrievalStrategy,
    pub latency_ms: u64,
    pub web_search: bool,
    pub parallelize: bool,
    pub model_tier: ModelTier,
}

/// Everything decided about a query before retrieval starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub intent: QueryIntent,
    pub level: ComplexityLevel,
    pub strategy: RetrievalStrategy,
    pub scope: RetrievalScope,
    pub latency_ms: u64,
    pub web_search: bool,
    pub parallelize: bool,
    pub model_tier: ModelTier,
}

impl QueryAnalysis {
    /// Replace the scope, e.g. with a hinted or operator-adjusted copy.
    pub fn with_scope(mut self, scope: RetrievalScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Which collaborators to consult for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetrievalPlan {
    pub semantic: bool,
    pub call_graph: bool,
    pub history: bool,
    pub web: bool,
    /// Whether the strategy expects parallel retrieval.
    pub parallel: bool,
}

impl RetrievalPlan {
    /// Drop sources the operator has switched off.
    pub fn restricted_to(self, call_graph: bool, history: bool, web: bool) -> Self {
        Self {
            call_graph: self.call_graph && call_graph,
            history: self.history && history,
            web: self.web && web,
            ..self
        }
    }
}

/// Routes queries to strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector {
    classifier: ComplexityClassifier,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self {
            classifier: ComplexityClassifier::new(),
        }
    }

    /// Pick a strategy for a level and intent.
    pub fn select(&self, level: ComplexityLevel, intent: QueryIntent) -> StrategyDecision {
        let strategy = match level {
            ComplexityLevel::Simple => RetrievalStrategy::FastLookup,
            ComplexityLevel::Focused => match intent {
                QueryIntent::ExplainCode | QueryIntent::WriteCode => {
                    RetrievalStrategy::SemanticSearch
                }
                _ => RetrievalStrategy::SemanticPlusGraph,
            },
            ComplexityLevel::Moderate => RetrievalStrategy::SemanticPlusGraph,
            ComplexityLevel::Complex => RetrievalStrategy::FullAnalysis,
            ComplexityLevel::CrossService => RetrievalStrategy::CrossService,
        };
        self.decision(strategy, level, intent)
    }

    fn decision(
        &self,
        strategy: RetrievalStrategy,
        level: ComplexityLevel,
        intent: QueryIntent,
    ) -> StrategyDecision {
        let broad = matches!(level, ComplexityLevel::Complex | ComplexityLevel::CrossService);
        StrategyDecision {
            strategy,
            latency_ms: strategy.latency_ms(),
            web_search: intent.wants_external() || broad,
            parallelize: broad,
            model_tier: ModelTier::for_level(level),
        }
    }

    /// Classify a query and route it.
    pub fn analyze(&self, query: &str, intent: QueryIntent) -> QueryAnalysis {
        let level = self.classifier.classify(query);
        let decision = self.select(level, intent);
        build_analysis(query, intent, level, decision)
    }

    /// Re-route an analysis onto an escalated strategy and its wider scope.
    pub fn escalated(&self, analysis: &QueryAnalysis, strategy: RetrievalStrategy) -> QueryAnalysis {
        let level = strategy.level().max(analysis.level);
        let decision = self.decision(strategy, level, analysis.intent);
        build_analysis(&analysis.query, analysis.intent, level, decision)
    }

    /// Which collaborators the analysis calls for.
    pub fn plan(&self, analysis: &QueryAnalysis) -> RetrievalPlan {
        RetrievalPlan {
            semantic: true,
            call_graph: analysis.strategy >= RetrievalStrategy::SemanticPlusGraph
                && analysis.scope.enable_graph,
            history: analysis.scope.enable_history,
            web: analysis.web_search || analysis.scope.enable_web,
            parallel: analysis.parallelize,
        }
    }

    /// Whether results for this level are worth caching.
    pub fn should_cache(&self, level: ComplexityLevel) -> bool {
        level != ComplexityLevel::Simple
    }
}

fn build_analysis(
    query: &str,
    intent: QueryIntent,
    level: ComplexityLevel,
    decision: StrategyDecision,
) -> QueryAnalysis {
    QueryAnalysis {
        query: query.to_string(),
        intent,
        level,
        strategy: decision.strategy,
        scope: scope_for(level).clone(),
        latency_ms: decision.latency_ms,
        web_search: decision.web_search,
        parallelize: decision.parallelize,
        model_tier: decision.model_tier,
    }
}

/// Decides whether a poor retrieval should be retried with more effort.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveEscalator;

impl AdaptiveEscalator {
    pub fn new() -> Self {
        Self
    }

    /// Next strategy to try, or `None` if quality suffices or the chain is exhausted.
    pub fn escalate(&self, current: RetrievalStrategy, quality: f64) -> Option<RetrievalStrategy> {
        if quality >= ESCALATION_THRESHOLD {
            return None;
        }
        current.successor()
    }
}
