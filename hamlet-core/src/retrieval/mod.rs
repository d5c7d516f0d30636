//! Memory retrieval — blended recency / importance / relevance ranking.
//!
//! Given a set of focal terms (short fragments describing what the agent
//! currently cares about), the engine scores every candidate node, ranks
//! deterministically, returns the top-K, and marks them accessed.

pub mod scoring;

pub use scoring::ScoreBreakdown;

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::{keywords, AssociativeMemory};
use crate::types::{Embedding, NodeId, RetrievalScore, Tick};

/// A scored retrieval result.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// The retrieved node's id (resolve through the owning store).
    pub node_id: NodeId,
    /// Blended score the node ranked with.
    pub score: RetrievalScore,
    /// Per-component breakdown, useful for debugging and tuning.
    pub breakdown: ScoreBreakdown,
}

/// The retrieval engine. Stateless apart from its configuration; one
/// instance serves every agent.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Create a new retrieval engine with the given configuration.
    #[must_use]
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Retrieve the top-K most relevant nodes for the focal terms.
    ///
    /// Ranking is by blended score descending, ties broken by more recent
    /// `created_at`, then lower id — re-running on an unmodified store
    /// yields identical output. Returned nodes are touched at `now`.
    ///
    /// An empty store yields an empty result; fewer than K candidates
    /// yield them all. Embedding failures degrade relevance to neutral
    /// instead of failing the query.
    pub fn retrieve(
        &self,
        store: &mut AssociativeMemory,
        focal_terms: &[String],
        embedder: &dyn EmbeddingProvider,
        now: Tick,
    ) -> Vec<RetrievalResult> {
        if store.is_empty() {
            return Vec::new();
        }

        let query_embeddings = self.embed_focal_terms(focal_terms, embedder);
        let candidates = self.candidate_ids(store, focal_terms);
        let poignancy_range = store.poignancy_range();

        let mut results: Vec<(RetrievalResult, Tick)> = store
            .iter()
            .filter(|node| candidates.as_ref().is_none_or(|ids| ids.contains(&node.id)))
            .map(|node| {
                let breakdown = scoring::compute_breakdown(
                    node,
                    &query_embeddings,
                    now,
                    poignancy_range,
                    self.config.recency_half_life_ticks,
                    &self.config.weights,
                );
                (
                    RetrievalResult {
                        node_id: node.id,
                        score: RetrievalScore::new(breakdown.total()),
                        breakdown,
                    },
                    node.created_at,
                )
            })
            .collect();

        results.sort_by(|(a, a_created), (b, b_created)| {
            b.score
                .cmp(&a.score)
                .then_with(|| b_created.cmp(a_created))
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        results.truncate(self.config.top_k);

        let results: Vec<RetrievalResult> = results.into_iter().map(|(r, _)| r).collect();
        for result in &results {
            // Ids came from the store's own iterator, so touch cannot miss.
            let _ = store.touch(result.node_id, now);
        }

        debug!(
            focal_terms = focal_terms.len(),
            returned = results.len(),
            "retrieval query complete"
        );
        results
    }

    /// Embed each focal term, silently skipping terms the provider fails
    /// on. No embeddings at all means relevance scores neutral.
    fn embed_focal_terms(
        &self,
        focal_terms: &[String],
        embedder: &dyn EmbeddingProvider,
    ) -> Vec<Embedding> {
        focal_terms
            .iter()
            .filter_map(|term| match embedder.embed(term) {
                Ok(embedding) => Some(embedding),
                Err(err) => {
                    debug!(term = %term, error = %err, "focal term embedding unavailable");
                    None
                }
            })
            .collect()
    }

    /// Candidate restriction for the keyword fast path: the union of
    /// keyword matches across all focal-term tokens. `None` means "score
    /// the whole store".
    fn candidate_ids(
        &self,
        store: &AssociativeMemory,
        focal_terms: &[String],
    ) -> Option<BTreeSet<NodeId>> {
        if !self.config.keyword_fast_path {
            return None;
        }
        let mut ids = BTreeSet::new();
        for term in focal_terms {
            if let Some(phrase) = keywords::normalize(term) {
                ids.extend(store.get_by_keyword(&phrase));
            }
            for word in term.split_whitespace() {
                if let Some(token) = keywords::normalize(word) {
                    ids.extend(store.get_by_keyword(&token));
                }
            }
        }
        Some(ids)
    }
}
