//! Retrieval quality scoring.

use serde::{Deserialize, Serialize};

use crate::context::ContextItem;

/// Relevance at or above which a retrieved item counts as a precise hit.
pub const PRECISE_RELEVANCE: f64 = 0.7;

/// Five quality signals for one retrieval, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Fraction of retrieved items with relevance ≥ 0.7.
    pub precision: f64,
    /// Packed count over retrieved count.
    pub utilization: f64,
    /// Average packed relevance per thousand packed tokens.
    pub efficiency: f64,
    /// Average relevance of packed items.
    pub relevance: f64,
    /// Informational; not part of [`overall`](Self::overall).
    pub coverage: f64,
}

impl QualityMetrics {
    /// Equal-weighted mean of precision, utilization, efficiency and relevance.
    pub fn overall(&self) -> f64 {
        0.25 * (self.precision + self.utilization + self.efficiency + self.relevance)
    }
}

/// Computes [`QualityMetrics`] from the retrieved and packed item sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, retrieved: &[ContextItem], packed: &[ContextItem]) -> QualityMetrics {
        let precision = if retrieved.is_empty() {
            0.0
        } else {
            let hits = retrieved.iter().filter(|i| i.relevance >= PRECISE_RELEVANCE).count();
            hits as f64 / retrieved.len() as f64
        };

        let utilization = (packed.len() as f64 / retrieved.len().max(1) as f64).min(1.0);

        let avg_relevance = if packed.is_empty() {
            0.0
        } else {
            packed.iter().map(|i| i.relevance).sum::<f64>() / packed.len() as f64
        };

        let packed_tokens: usize = packed.iter().map(ContextItem::estimated_tokens).sum();
        let efficiency = if packed_tokens == 0 {
            0.0
        } else {
            (avg_relevance / (packed_tokens as f64 / 1000.0)).min(1.0)
        };

        QualityMetrics {
            precision,
            utilization,
            efficiency,
            relevance: avg_relevance.min(1.0),
            coverage: (precision * 1.2).min(1.0),
        }
    }
}
