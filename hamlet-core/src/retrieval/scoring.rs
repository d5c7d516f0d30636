//! Per-component scoring functions for memory retrieval.
//!
//! Score = w_r·Recency(m) + w_i·Importance(m) + w_v·Relevance(m)
//!
//! Every component is normalized into [0, 1] before weighting:
//!   Recency(m)    = 0.5 ^ (Δticks / half_life)
//!   Importance(m) = (poignancy − min) / (max − min)   over the store's observed range
//!   Relevance(m)  = (cosine + 1) / 2                  best match across focal terms

use crate::config::RetrievalWeights;
use crate::memory::MemoryNode;
use crate::types::{Embedding, Tick};

/// Component score used when a signal is unavailable (no embedding, or a
/// degenerate importance range). Neutral rather than zero so missing data
/// doesn't bury a node.
pub const NEUTRAL: f64 = 0.5;

/// Weighted breakdown of a retrieval score. Summing the fields yields the
/// blended score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Weighted recency contribution.
    pub recency: f64,
    /// Weighted importance contribution.
    pub importance: f64,
    /// Weighted relevance contribution.
    pub relevance: f64,
}

impl ScoreBreakdown {
    /// The blended score.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.recency + self.importance + self.relevance
    }
}

/// Compute the weighted breakdown for a single node.
#[must_use]
pub fn compute_breakdown(
    node: &MemoryNode,
    query_embeddings: &[Embedding],
    now: Tick,
    poignancy_range: Option<(f32, f32)>,
    half_life_ticks: f64,
    weights: &RetrievalWeights,
) -> ScoreBreakdown {
    ScoreBreakdown {
        recency: weights.recency * recency_score(node.last_accessed_at, now, half_life_ticks),
        importance: weights.importance * importance_score(node.poignancy, poignancy_range),
        relevance: weights.relevance * relevance_score(node.embedding.as_ref(), query_embeddings),
    }
}

/// Exponential recency decay: halves every `half_life_ticks` since the
/// node was last accessed. A node touched this tick scores exactly 1.0.
#[must_use]
pub fn recency_score(last_accessed: Tick, now: Tick, half_life_ticks: f64) -> f64 {
    let delta = now.since(last_accessed) as f64;
    if half_life_ticks <= 0.0 {
        return if delta == 0.0 { 1.0 } else { 0.0 };
    }
    0.5_f64.powf(delta / half_life_ticks)
}

/// Linear rescale of poignancy into [0, 1] over the store's observed
/// range at query time. A degenerate range (all nodes equal) is neutral.
#[must_use]
pub fn importance_score(poignancy: f32, range: Option<(f32, f32)>) -> f64 {
    match range {
        Some((lo, hi)) if hi > lo => f64::from((poignancy - lo) / (hi - lo)).clamp(0.0, 1.0),
        _ => NEUTRAL,
    }
}

/// Cosine similarity against the best-matching focal-term embedding,
/// rescaled from [-1, 1] into [0, 1].
///
/// Neutral when the node has no embedding or no query embeddings exist
/// (embedding provider down).
#[must_use]
pub fn relevance_score(node_embedding: Option<&Embedding>, query_embeddings: &[Embedding]) -> f64 {
    let Some(node_embedding) = node_embedding else {
        return NEUTRAL;
    };
    if query_embeddings.is_empty() {
        return NEUTRAL;
    }
    let best = query_embeddings
        .iter()
        .map(|q| f64::from(q.cosine_similarity(node_embedding)))
        .fold(f64::NEG_INFINITY, f64::max);
    ((best + 1.0) / 2.0).clamp(0.0, 1.0)
}
