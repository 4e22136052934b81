//! Scripted collaborators for pipeline tests.
//!
//! Each fixture returns canned data and records how it was called, so tests
//! can assert both on the delivered bundle and on what the pipeline asked
//! for. [`Failing`] and [`Slow`] wrap any behaviour with an error or a delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ctxroute_core::collaborators::{
    CallGraph, CollaboratorError, HistorySource, Indexer, SearchHit, SemanticSearch, WebSearch,
};
use ctxroute_core::BoxFuture;

/// Semantic search returning a fixed hit list, truncated to the requested limit.
#[derive(Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
    last_limit: AtomicUsize,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Arc<Self> {
        Arc::new(Self {
            hits,
            ..Self::default()
        })
    }

    /// `n` distinct hits under `src/` with descending scores from `top`.
    pub fn numbered(n: usize, top: f64) -> Arc<Self> {
        let hits = (0..n)
            .map(|i| {
                SearchHit::new(
                    format!("fn handler_{i}() {{\n    todo!()\n}}"),
                    format!("src/handler_{i}.rs"),
                    (top - i as f64 * 0.01).max(0.0),
                )
                .with_lines(1, 3)
                .with_symbol(format!("handler_{i}"))
            })
            .collect();
        Self::new(hits)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> usize {
        self.last_limit.load(Ordering::SeqCst)
    }
}

impl SemanticSearch for StaticSearch {
    fn search<'a>(
        &'a self,
        _query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>, CollaboratorError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        let hits = self.hits.iter().take(limit).cloned().collect();
        Box::pin(async move { Ok(hits) })
    }
}

/// Call graph backed by two adjacency maps.
#[derive(Default)]
pub struct StaticGraph {
    callers: HashMap<String, Vec<String>>,
    callees: HashMap<String, Vec<String>>,
    last_depth: AtomicUsize,
}

impl StaticGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callers(mut self, symbol: &str, callers: &[&str]) -> Self {
        self.callers
            .insert(symbol.to_string(), callers.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_callees(mut self, symbol: &str, callees: &[&str]) -> Self {
        self.callees
            .insert(symbol.to_string(), callees.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn last_depth(&self) -> usize {
        self.last_depth.load(Ordering::SeqCst)
    }
}

impl CallGraph for StaticGraph {
    fn callers_of<'a>(
        &'a self,
        symbol: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, Result<Vec<String>, CollaboratorError>> {
        self.last_depth.store(depth as usize, Ordering::SeqCst);
        let found = self.callers.get(symbol).cloned().unwrap_or_default();
        Box::pin(async move { Ok(found) })
    }

    fn callees_of<'a>(
        &'a self,
        symbol: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, Result<Vec<String>, CollaboratorError>> {
        self.last_depth.store(depth as usize, Ordering::SeqCst);
        let found = self.callees.get(symbol).cloned().unwrap_or_default();
        Box::pin(async move { Ok(found) })
    }
}

/// History source returning fixed text and recording the lookback it was given.
pub struct StaticHistory {
    text: String,
    calls: AtomicUsize,
    last_days: AtomicUsize,
    last_paths: Mutex<Vec<String>>,
}

impl StaticHistory {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
            last_days: AtomicUsize::new(0),
            last_paths: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_days(&self) -> usize {
        self.last_days.load(Ordering::SeqCst)
    }

    /// Paths passed to the most recent call.
    pub fn last_paths(&self) -> Vec<String> {
        self.last_paths
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }
}

impl HistorySource for StaticHistory {
    fn recent_context<'a>(
        &'a self,
        paths: &'a [String],
        lookback_days: u32,
        _limit: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_days.store(lookback_days as usize, Ordering::SeqCst);
        if let Ok(mut last) = self.last_paths.lock() {
            *last = paths.to_vec();
        }
        Box::pin(async move { Ok(self.text.clone()) })
    }
}

/// Web search returning fixed text.
pub struct StaticWeb {
    text: String,
    calls: AtomicUsize,
}

impl StaticWeb {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebSearch for StaticWeb {
    fn search_formatted<'a>(
        &'a self,
        _query: &'a str,
        _limit: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(self.text.clone()) })
    }
}

/// A collaborator whose every call fails.
pub struct Failing;

impl Failing {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }

    fn err<T: Send + 'static>() -> BoxFuture<'static, Result<T, CollaboratorError>> {
        Box::pin(async { Err(CollaboratorError::Unavailable("scripted failure".into())) })
    }
}

impl SemanticSearch for Failing {
    fn search<'a>(&'a self, _: &'a str, _: usize) -> BoxFuture<'a, Result<Vec<SearchHit>, CollaboratorError>> {
        Self::err()
    }
}

impl CallGraph for Failing {
    fn callers_of<'a>(&'a self, _: &'a str, _: u32) -> BoxFuture<'a, Result<Vec<String>, CollaboratorError>> {
        Self::err()
    }

    fn callees_of<'a>(&'a self, _: &'a str, _: u32) -> BoxFuture<'a, Result<Vec<String>, CollaboratorError>> {
        Self::err()
    }
}

impl HistorySource for Failing {
    fn recent_context<'a>(
        &'a self,
        _: &'a [String],
        _: u32,
        _: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Self::err()
    }
}

impl WebSearch for Failing {
    fn search_formatted<'a>(&'a self, _: &'a str, _: usize) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Self::err()
    }
}

impl Indexer for Failing {
    fn index(&self, _: bool) -> BoxFuture<'_, Result<usize, CollaboratorError>> {
        Self::err()
    }

    fn indexed_units(&self) -> usize {
        0
    }
}

/// Delays another collaborator's responses.
pub struct Slow<T> {
    inner: Arc<T>,
    delay: Duration,
}

impl<T> Slow<T> {
    pub fn new(inner: Arc<T>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

impl<T: SemanticSearch> SemanticSearch for Slow<T> {
    fn search<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>, CollaboratorError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.search(query, limit).await
        })
    }
}

impl<T: HistorySource> HistorySource for Slow<T> {
    fn recent_context<'a>(
        &'a self,
        paths: &'a [String],
        lookback_days: u32,
        limit: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.recent_context(paths, lookback_days, limit).await
        })
    }
}

impl<T: WebSearch> WebSearch for Slow<T> {
    fn search_formatted<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.search_formatted(query, limit).await
        })
    }
}

/// Indexer that adds a fixed number of units per run and records `force` flags.
pub struct CountingIndexer {
    units_per_run: usize,
    units: AtomicUsize,
    runs: Mutex<Vec<bool>>,
}

impl CountingIndexer {
    pub fn new(units_per_run: usize) -> Arc<Self> {
        Arc::new(Self {
            units_per_run,
            units: AtomicUsize::new(0),
            runs: Mutex::new(Vec::new()),
        })
    }

    /// The `force` flag of every run so far.
    pub fn runs(&self) -> Vec<bool> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Indexer for CountingIndexer {
    fn index(&self, force: bool) -> BoxFuture<'_, Result<usize, CollaboratorError>> {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(force);
        }
        let total = if force {
            self.units.store(self.units_per_run, Ordering::SeqCst);
            self.units_per_run
        } else {
            self.units.fetch_add(self.units_per_run, Ordering::SeqCst) + self.units_per_run
        };
        Box::pin(async move { Ok(total) })
    }

    fn indexed_units(&self) -> usize {
        self.units.load(Ordering::SeqCst)
    }
}
