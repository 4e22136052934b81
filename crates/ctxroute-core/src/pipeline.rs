//! Per-query retrieval pipeline.
//!
//! ```text
//! RECEIVED → CLASSIFIED → SCOPED → RETRIEVED → SECURITY_FILTERED
//!          → SCOPE_FILTERED → BUDGETED → PACKED → SCORED → DELIVERED
//! ```
//!
//! Every stage is a pure transformation except RETRIEVED, which fans out to
//! the configured collaborators concurrently. Collaborator failures and
//! timeouts contribute nothing and are logged; a query always produces a
//! bundle.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ctxroute_config::AppConfig;

use crate::cache::RecencyCache;
use crate::collaborators::{
    CallGraph, CollaboratorError, HistorySource, Indexer, SearchHit, SemanticSearch, WebSearch,
};
use crate::context::{
    BudgetAllocator, ContextItem, SourceKind, TokenBudget, format_for_model, pack,
    resolve_context_window,
};
use crate::intent::{IntentClassifier, QueryIntent};
use crate::quality::{QualityMetrics, QualityScorer};
use crate::scope::{RetrievalScope, ScopeHint};
use crate::security::SecurityFilter;
use crate::strategy::{
    AdaptiveEscalator, QueryAnalysis, RetrievalPlan, RetrievalStrategy, StrategySelector,
};
use crate::tokens::{CountMethod, TokenCounter};

/// Source label of the call-graph summary item.
pub const CALL_GRAPH_SOURCE: &str = "call_graph_analysis";
/// Source label of the history summary item.
pub const HISTORY_SOURCE: &str = "git_history";
/// Source label of the web results item.
pub const WEB_SOURCE: &str = "web_search";

const SEMANTIC_PRIORITY: f64 = 1.0;
const GRAPH_RELEVANCE: f64 = 0.8;
const GRAPH_PRIORITY: f64 = 0.7;
const HISTORY_RELEVANCE: f64 = 0.6;
const HISTORY_PRIORITY: f64 = 0.5;
const WEB_RELEVANCE: f64 = 0.65;
const WEB_PRIORITY: f64 = 0.4;

const MAX_GRAPH_SYMBOLS: usize = 3;
const MAX_LISTED_NEIGHBOURS: usize = 5;
const HISTORY_LIMIT: usize = 5;
const HISTORY_FILES: usize = 5;
const WEB_LIMIT: usize = 5;
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Received,
    Classified,
    Scoped,
    Retrieved,
    SecurityFiltered,
    ScopeFiltered,
    Budgeted,
    Packed,
    Scored,
    Delivered,
}

impl Stage {
    /// Every stage, in traversal order.
    pub const ALL: [Stage; 10] = [
        Stage::Received,
        Stage::Classified,
        Stage::Scoped,
        Stage::Retrieved,
        Stage::SecurityFiltered,
        Stage::ScopeFiltered,
        Stage::Budgeted,
        Stage::Packed,
        Stage::Scored,
        Stage::Delivered,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "RECEIVED",
            Stage::Classified => "CLASSIFIED",
            Stage::Scoped => "SCOPED",
            Stage::Retrieved => "RETRIEVED",
            Stage::SecurityFiltered => "SECURITY_FILTERED",
            Stage::ScopeFiltered => "SCOPE_FILTERED",
            Stage::Budgeted => "BUDGETED",
            Stage::Packed => "PACKED",
            Stage::Scored => "SCORED",
            Stage::Delivered => "DELIVERED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The external services a pipeline retrieves from. All optional.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub semantic: Option<Arc<dyn SemanticSearch>>,
    pub call_graph: Option<Arc<dyn CallGraph>>,
    pub history: Option<Arc<dyn HistorySource>>,
    pub web: Option<Arc<dyn WebSearch>>,
    pub indexer: Option<Arc<dyn Indexer>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_semantic(mut self, semantic: Arc<dyn SemanticSearch>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_call_graph(mut self, call_graph: Arc<dyn CallGraph>) -> Self {
        self.call_graph = Some(call_graph);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySource>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_web(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("semantic", &self.semantic.is_some())
            .field("call_graph", &self.call_graph.is_some())
            .field("history", &self.history.is_some())
            .field("web", &self.web.is_some())
            .field("indexer", &self.indexer.is_some())
            .finish()
    }
}

/// A retrieval request with optional overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    /// Classified from the query when absent.
    pub intent: Option<QueryIntent>,
    /// Falls back to `retrieval.max_results`.
    pub max_results: Option<usize>,
    pub hint: Option<ScopeHint>,
    /// Falls back to `retrieval.adaptive`.
    pub adaptive: Option<bool>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            intent: None,
            max_results: None,
            hint: None,
            adaptive: None,
        }
    }

    pub fn with_intent(mut self, intent: QueryIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_hint(mut self, hint: ScopeHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = Some(adaptive);
        self
    }
}

/// Everything delivered for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedContextBundle {
    /// Packed items in rank order.
    pub items: Vec<ContextItem>,
    /// Items rendered for the model.
    pub formatted: String,
    pub analysis: QueryAnalysis,
    pub budget: TokenBudget,
    pub metrics: QualityMetrics,
    pub elapsed_ms: u64,
    /// Candidates removed by the security filter.
    pub security_filtered: usize,
    pub tokens_used: usize,
    /// Stages visited, in order.
    pub stages: Vec<Stage>,
    /// Strategies tried after the first, in order.
    pub escalations: Vec<RetrievalStrategy>,
    pub cache_hit: bool,
}

impl EnhancedContextBundle {
    /// Overall quality of the delivered context.
    pub fn quality(&self) -> f64 {
        self.metrics.overall()
    }
}

/// Errors from pipeline operations outside the per-query path.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no indexer configured")]
    NoIndexer,

    #[error("indexing failed: {0}")]
    Index(#[from] CollaboratorError),
}

/// Orchestrates classification, retrieval, filtering, packing and scoring.
pub struct Pipeline {
    config: AppConfig,
    collaborators: Collaborators,
    intents: IntentClassifier,
    selector: StrategySelector,
    escalator: AdaptiveEscalator,
    security: SecurityFilter,
    allocator: BudgetAllocator,
    scorer: QualityScorer,
    cache: RecencyCache<EnhancedContextBundle>,
    system_prompt_tokens: usize,
}

impl Pipeline {
    /// Build a pipeline from validated configuration.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let window = resolve_context_window(&config.model.name, config.model.context_window);
        let system_prompt_tokens =
            TokenCounter::estimate(&config.model.system_prompt, CountMethod::Word);
        info!(
            model = %config.model.name,
            window,
            collaborators = ?collaborators,
            "Retrieval pipeline ready"
        );
        Self {
            intents: IntentClassifier::new(),
            selector: StrategySelector::new(),
            escalator: AdaptiveEscalator::new(),
            security: SecurityFilter::from_config(&config.security),
            allocator: BudgetAllocator::new(window),
            scorer: QualityScorer::new(),
            cache: RecencyCache::from_config(&config.cache),
            system_prompt_tokens,
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Context window the pipeline budgets against.
    pub fn context_window(&self) -> usize {
        self.allocator.context_window()
    }

    /// Retrieve context for a query with an explicit intent.
    pub async fn retrieve(
        &self,
        query: &str,
        intent: QueryIntent,
        max_results: usize,
    ) -> EnhancedContextBundle {
        self.retrieve_with(
            RetrievalRequest::new(query)
                .with_intent(intent)
                .with_max_results(max_results),
        )
        .await
    }

    /// Retrieve context for a request.
    pub async fn retrieve_with(&self, request: RetrievalRequest) -> EnhancedContextBundle {
        let started = Instant::now();
        let deadline = deadline_after(started, self.config.retrieval.query_timeout_ms);
        debug!(stage = %Stage::Received, query = %request.query, "Query received");

        let intent = match request.intent {
            Some(intent) => intent,
            None => {
                let (intent, confidence) = self.intents.classify(&request.query);
                debug!(intent = %intent, confidence, "Intent classified");
                intent
            }
        };
        let analysis = self.selector.analyze(&request.query, intent);
        debug!(
            stage = %Stage::Classified,
            level = %analysis.level,
            strategy = %analysis.strategy,
            "Query classified"
        );

        // Hinted scopes differ from the plain one, so they bypass the cache.
        let cacheable = request.hint.is_none() && self.selector.should_cache(analysis.level);
        if cacheable && let Some(mut cached) = self.cache.get(&request.query) {
            cached.cache_hit = true;
            cached.elapsed_ms = elapsed_ms(started);
            info!(level = %cached.analysis.level, items = cached.items.len(), "Served from cache");
            return cached;
        }

        let adaptive = request.adaptive.unwrap_or(self.config.retrieval.adaptive);
        let mut best = self.run(&request, analysis, started, deadline).await;

        if adaptive {
            let mut escalations = Vec::new();
            let mut current = best.analysis.clone();
            let mut quality = best.quality();
            while escalations.len() < self.config.retrieval.max_escalations {
                if Instant::now() >= deadline {
                    warn!(quality, "Query deadline reached; not escalating further");
                    break;
                }
                let Some(next) = self.escalator.escalate(current.strategy, quality) else {
                    break;
                };
                info!(from = %current.strategy, to = %next, quality, "Escalating retrieval strategy");
                escalations.push(next);
                let attempt = self
                    .run(&request, self.selector.escalated(&current, next), started, deadline)
                    .await;
                quality = attempt.quality();
                current = attempt.analysis.clone();
                if quality > best.quality() {
                    best = attempt;
                }
            }
            best.escalations = escalations;
        }

        best.elapsed_ms = elapsed_ms(started);
        if cacheable {
            self.cache.put(&request.query, best.clone());
        }

        info!(
            level = %best.analysis.level,
            strategy = %best.analysis.strategy,
            items = best.items.len(),
            tokens = best.tokens_used,
            filtered = best.security_filtered,
            quality = best.quality(),
            elapsed_ms = best.elapsed_ms,
            "Context delivered"
        );
        best
    }

    /// One pass from SCOPED to DELIVERED for an analysis.
    async fn run(
        &self,
        request: &RetrievalRequest,
        analysis: QueryAnalysis,
        started: Instant,
        deadline: Instant,
    ) -> EnhancedContextBundle {
        let mut stages = vec![Stage::Received, Stage::Classified];

        let scope = self.effective_scope(&analysis.scope, request.hint);
        let analysis = analysis.with_scope(scope);
        stages.push(Stage::Scoped);
        debug!(
            stage = %Stage::Scoped,
            max_tokens = analysis.scope.max_tokens,
            max_items = analysis.scope.max_items,
            "Scope selected"
        );

        let retrieval = &self.config.retrieval;
        let plan = self.selector.plan(&analysis).restricted_to(
            retrieval.enable_call_graph,
            retrieval.enable_history,
            retrieval.enable_web_search,
        );
        let max_results = request.max_results.unwrap_or(retrieval.max_results);
        let candidates = self.gather(&analysis, plan, max_results, deadline).await;
        stages.push(Stage::Retrieved);
        debug!(stage = %Stage::Retrieved, candidates = candidates.len(), "Candidates gathered");

        let (candidates, security_filtered) = self.security.filter(candidates);
        stages.push(Stage::SecurityFiltered);
        debug!(stage = %Stage::SecurityFiltered, removed = security_filtered, "Security filter applied");

        let candidates = apply_scope(&analysis.scope, candidates);
        stages.push(Stage::ScopeFiltered);
        debug!(stage = %Stage::ScopeFiltered, kept = candidates.len(), "Scope filter applied");

        let query_tokens = TokenCounter::estimate(&request.query, CountMethod::Word);
        let budget = self.allocator.allocate(
            self.system_prompt_tokens,
            query_tokens,
            self.config.model.response_target,
        );
        stages.push(Stage::Budgeted);
        let pack_budget = budget.remaining_context.min(analysis.scope.max_tokens);
        debug!(stage = %Stage::Budgeted, pack_budget, "Budget allocated");

        let (items, tokens_used) = pack(candidates.clone(), pack_budget);
        stages.push(Stage::Packed);
        debug!(stage = %Stage::Packed, items = items.len(), tokens_used, "Window packed");

        let metrics = self.scorer.score(&candidates, &items);
        stages.push(Stage::Scored);
        debug!(stage = %Stage::Scored, quality = metrics.overall(), "Retrieval scored");

        let formatted = format_for_model(&items);
        stages.push(Stage::Delivered);

        EnhancedContextBundle {
            items,
            formatted,
            analysis,
            budget,
            metrics,
            elapsed_ms: elapsed_ms(started),
            security_filtered,
            tokens_used,
            stages,
            escalations: Vec::new(),
            cache_hit: false,
        }
    }

    fn effective_scope(&self, scope: &RetrievalScope, hint: Option<ScopeHint>) -> RetrievalScope {
        let scope = match hint {
            Some(hint) => scope.with_hint(hint),
            None => scope.clone(),
        };
        scope.with_excludes(self.config.retrieval.exclude_paths.iter().cloned())
    }

    /// Fan out to the planned collaborators and merge their results.
    ///
    /// Web search runs alongside everything else. Graph and history lookups
    /// wait for semantic search so they can follow the symbols and files it
    /// found.
    async fn gather(
        &self,
        analysis: &QueryAnalysis,
        plan: RetrievalPlan,
        max_results: usize,
        deadline: Instant,
    ) -> Vec<ContextItem> {
        let scope = &analysis.scope;
        let query = analysis.query.as_str();

        let code = async {
            let hits = match (&self.collaborators.semantic, plan.semantic) {
                (Some(search), true) => self
                    .bounded(
                        "semantic",
                        deadline,
                        search.search(query, max_results.saturating_mul(2)),
                    )
                    .await
                    .map(|hits| relevant_hits(hits, scope.min_relevance, max_results))
                    .unwrap_or_default(),
                _ => Vec::new(),
            };

            let symbols = graph_symbols(&hits, query);
            let paths = history_paths(&hits, &scope.include);

            let graph = async {
                match (&self.collaborators.call_graph, plan.call_graph) {
                    (Some(graph), true) if !symbols.is_empty() => self
                        .bounded(
                            "call_graph",
                            deadline,
                            call_graph_summary(graph.as_ref(), &symbols, scope.graph_depth),
                        )
                        .await
                        .and_then(|text| summary_item(text, CALL_GRAPH_SOURCE, SourceKind::Graph)),
                    _ => None,
                }
            };

            let history = async {
                match (&self.collaborators.history, plan.history) {
                    (Some(history), true) => self
                        .bounded(
                            "history",
                            deadline,
                            history.recent_context(&paths, scope.history_days, HISTORY_LIMIT),
                        )
                        .await
                        .and_then(|text| summary_item(text, HISTORY_SOURCE, SourceKind::History)),
                    _ => None,
                }
            };

            let (graph, history) = tokio::join!(graph, history);
            let mut items = semantic_items(hits);
            items.extend(graph);
            items.extend(history);
            items
        };

        let web = async {
            match (&self.collaborators.web, plan.web) {
                (Some(web), true) => self
                    .bounded("web", deadline, web.search_formatted(query, WEB_LIMIT))
                    .await
                    .and_then(|text| summary_item(text, WEB_SOURCE, SourceKind::Web)),
                _ => None,
            }
        };

        let (mut items, web) = tokio::join!(code, web);
        items.extend(web);
        items
    }

    /// Await a collaborator call under its own and the query's deadline.
    async fn bounded<T, F>(&self, source: &'static str, deadline: Instant, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let call_deadline = deadline_after(
            Instant::now(),
            self.config.retrieval.collaborator_timeout_ms,
        )
        .min(deadline);
        match tokio::time::timeout_at(call_deadline, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(source, error = %e, "Collaborator failed; continuing without it");
                None
            }
            Err(_) => {
                warn!(source, "Collaborator timed out; continuing without it");
                None
            }
        }
    }

    /// Build or refresh the code index.
    ///
    /// Clears the recency cache, since cached bundles may be stale.
    pub async fn index(&self, force: bool) -> Result<usize, PipelineError> {
        let indexer = self
            .collaborators
            .indexer
            .as_ref()
            .ok_or(PipelineError::NoIndexer)?;
        let units = indexer.index(force).await?;
        self.cache.clear();
        info!(units, force, "Index updated");
        Ok(units)
    }

    /// Whether the index holds anything to search.
    pub fn is_ready(&self) -> bool {
        self.collaborators
            .indexer
            .as_ref()
            .is_some_and(|indexer| indexer.indexed_units() > 0)
    }
}

/// `ms` after `start`, saturating at a far-future instant.
fn deadline_after(start: Instant, ms: u64) -> Instant {
    start
        .checked_add(Duration::from_millis(ms))
        .unwrap_or_else(|| start + FAR_FUTURE)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Hits at or above the scope threshold, best first, at most `max_results`.
fn relevant_hits(hits: Vec<SearchHit>, min_relevance: f64, max_results: usize) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|hit| hit.score >= min_relevance)
        .take(max_results)
        .collect()
}

fn semantic_items(hits: Vec<SearchHit>) -> Vec<ContextItem> {
    hits.into_iter()
        .map(|hit| {
            ContextItem::new(hit.content, hit.path, SourceKind::Semantic)
                .with_relevance(hit.score)
                .with_priority(SEMANTIC_PRIORITY)
                .with_start_line(hit.start_line)
        })
        .collect()
}

/// Symbols of the top hits, then code-like identifiers from the query.
fn graph_symbols(hits: &[SearchHit], query: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    let from_hits = hits
        .iter()
        .take(MAX_GRAPH_SYMBOLS)
        .filter_map(|hit| hit.symbol.clone());
    for symbol in from_hits.chain(extract_symbols(query)) {
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// Files of the top hits; the scope include list when there are none.
fn history_paths(hits: &[SearchHit], include: &[String]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for hit in hits.iter().take(HISTORY_FILES) {
        if !paths.contains(&hit.path) {
            paths.push(hit.path.clone());
        }
    }
    if paths.is_empty() {
        include.to_vec()
    } else {
        paths
    }
}

fn summary_item(text: String, source: &str, kind: SourceKind) -> Option<ContextItem> {
    if text.trim().is_empty() {
        return None;
    }
    let (relevance, priority) = match kind {
        SourceKind::Graph => (GRAPH_RELEVANCE, GRAPH_PRIORITY),
        SourceKind::History => (HISTORY_RELEVANCE, HISTORY_PRIORITY),
        SourceKind::Web => (WEB_RELEVANCE, WEB_PRIORITY),
        SourceKind::Semantic | SourceKind::Other => (0.5, 0.5),
    };
    Some(
        ContextItem::new(text, source, kind)
            .with_relevance(relevance)
            .with_priority(priority),
    )
}

/// Apply path rules to file-backed items, then cap the candidate count.
fn apply_scope(scope: &RetrievalScope, items: Vec<ContextItem>) -> Vec<ContextItem> {
    items
        .into_iter()
        .filter(|item| !item.kind.is_file_backed() || scope.includes(&item.source))
        .take(scope.max_items)
        .collect()
}

static IDENTIFIER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:(?:::|\.)[A-Za-z_][A-Za-z0-9_]*)*").ok()
});

/// Code-like identifiers in a query: snake_case, CamelCase, or paths.
fn extract_symbols(query: &str) -> Vec<String> {
    let Some(re) = IDENTIFIER.as_ref() else {
        return Vec::new();
    };
    let mut symbols: Vec<String> = Vec::new();
    for m in re.find_iter(query) {
        let token = m.as_str();
        if is_code_like(token) && !symbols.iter().any(|s| s == token) {
            symbols.push(token.to_string());
            if symbols.len() == MAX_GRAPH_SYMBOLS {
                break;
            }
        }
    }
    symbols
}

fn is_code_like(token: &str) -> bool {
    let inner_upper = token.chars().skip(1).any(|c| c.is_ascii_uppercase());
    let has_lower = token.chars().any(|c| c.is_ascii_lowercase());
    token.contains('_') || token.contains("::") || token.contains('.') || (inner_upper && has_lower)
}

async fn call_graph_summary(
    graph: &dyn CallGraph,
    symbols: &[String],
    depth: u32,
) -> Result<String, CollaboratorError> {
    let mut parts = Vec::new();
    for symbol in symbols {
        let (callers, callees) =
            tokio::join!(graph.callers_of(symbol, depth), graph.callees_of(symbol, depth));
        let (callers, callees) = (callers?, callees?);
        if callers.is_empty() && callees.is_empty() {
            continue;
        }
        parts.push(format!("### {symbol}"));
        if !callers.is_empty() {
            parts.push(format!("Called by: {}", list(&callers)));
        }
        if !callees.is_empty() {
            parts.push(format!("Calls: {}", list(&callees)));
        }
    }
    Ok(parts.join("\n"))
}

fn list(names: &[String]) -> String {
    names
        .iter()
        .take(MAX_LISTED_NEIGHBOURS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
