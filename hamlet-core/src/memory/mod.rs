//! Memory node definitions and the per-agent [`AssociativeMemory`] store.
//!
//! The store is append-only: nodes are never deleted or edited in place
//! within a run, other than the `last_accessed_at` bump when retrieval
//! touches them. Derived indexes (keyword → ids, id → position) are
//! rebuilt on deserialization rather than persisted.

pub mod keywords;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::types::{Embedding, NodeId, Tick};

/// Lowest assignable poignancy.
pub const POIGNANCY_MIN: f32 = 1.0;
/// Highest assignable poignancy.
pub const POIGNANCY_MAX: f32 = 10.0;

/// What kind of experience a memory node records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something the agent did or witnessed.
    Event,
    /// A synthesized idea, usually produced by reflection.
    Thought,
    /// A conversational exchange (or its summary).
    Chat,
}

/// One remembered unit, owned by exactly one agent's store.
///
/// Cross-agent references are by copy: an agent remembering "X told me Y"
/// stores its own node, never a shared one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Store-unique, monotonically assigned identifier.
    pub id: NodeId,
    /// Event, Thought, or Chat.
    pub kind: MemoryKind,
    /// Tick at which the node was created.
    pub created_at: Tick,
    /// Tick at which the node was last returned by retrieval.
    pub last_accessed_at: Tick,
    /// Structured triple: who/what the memory is about.
    pub subject: String,
    /// Structured triple: the relation.
    pub predicate: String,
    /// Structured triple: the target.
    pub object: String,
    /// Short natural-language description. Opaque to the engine beyond
    /// keyword indexing.
    pub description: String,
    /// Embedding computed once at creation; `None` when the provider was
    /// unavailable (relevance then scores neutral).
    pub embedding: Option<Embedding>,
    /// Importance in [`POIGNANCY_MIN`], [`POIGNANCY_MAX`]. Immutable
    /// after creation.
    pub poignancy: f32,
    /// Normalized index tokens extracted from the triple and description.
    pub keywords: BTreeSet<String>,
    /// Ids of the source nodes this node summarizes or was derived from.
    /// Always references earlier ids, so the derived-from relation is
    /// acyclic by construction.
    pub filling: Vec<NodeId>,
}

/// The fields a caller supplies when appending; ids, timestamps, and
/// keywords are assigned by the store.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    /// Event, Thought, or Chat.
    pub kind: MemoryKind,
    /// Structured triple subject (may be empty for Thought/Chat).
    pub subject: String,
    /// Structured triple predicate.
    pub predicate: String,
    /// Structured triple object.
    pub object: String,
    /// Short natural-language description.
    pub description: String,
    /// Embedding for the description, if the provider produced one.
    pub embedding: Option<Embedding>,
    /// Importance score; clamped into the valid range on append.
    pub poignancy: f32,
    /// Derived-from links to existing nodes.
    pub filling: Vec<NodeId>,
}

impl NodeDraft {
    /// Convenience constructor for an event draft.
    #[must_use]
    pub fn event(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
        poignancy: f32,
    ) -> Self {
        Self {
            kind: MemoryKind::Event,
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            description: description.into(),
            embedding: None,
            poignancy,
            filling: Vec::new(),
        }
    }

    /// Convenience constructor for a thought draft.
    #[must_use]
    pub fn thought(description: impl Into<String>, poignancy: f32, filling: Vec<NodeId>) -> Self {
        Self {
            kind: MemoryKind::Thought,
            subject: String::new(),
            predicate: String::new(),
            object: String::new(),
            description: description.into(),
            embedding: None,
            poignancy,
            filling,
        }
    }

    /// Convenience constructor for a chat draft.
    #[must_use]
    pub fn chat(description: impl Into<String>, poignancy: f32, filling: Vec<NodeId>) -> Self {
        Self {
            kind: MemoryKind::Chat,
            subject: String::new(),
            predicate: String::new(),
            object: String::new(),
            description: description.into(),
            embedding: None,
            poignancy,
            filling,
        }
    }

    /// Attach an embedding to the draft.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

// ---------------------------------------------------------------------------
// AssociativeMemory
// ---------------------------------------------------------------------------

/// Per-agent associative memory store.
///
/// Owns an insertion-ordered sequence of [`MemoryNode`]s plus derived
/// indexes and the unreflected-importance accumulator consumed by the
/// reflection trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoreData")]
pub struct AssociativeMemory {
    /// Insertion-ordered nodes. Position equals `id` order but not
    /// necessarily `id` value (ids survive snapshot restore verbatim).
    nodes: Vec<MemoryNode>,
    /// Next id to assign.
    next_id: u64,
    /// Embedding dimensionality this store accepts.
    embedding_dims: usize,
    /// Summed poignancy of nodes appended since the last reflection.
    unreflected_sum: f32,
    /// Ids of nodes appended since the last reflection.
    unreflected_nodes: Vec<NodeId>,
    /// keyword → ids of nodes carrying it.
    #[serde(skip)]
    keyword_index: HashMap<String, BTreeSet<NodeId>>,
    /// id → position in `nodes`.
    #[serde(skip)]
    id_index: HashMap<NodeId, usize>,
    /// Observed poignancy extremes, used for importance normalization.
    #[serde(skip)]
    poignancy_range: Option<(f32, f32)>,
}

/// Serialized form of the store; indexes are derived, so only the
/// authoritative fields travel.
#[derive(Debug, Clone, Deserialize)]
struct StoreData {
    nodes: Vec<MemoryNode>,
    next_id: u64,
    embedding_dims: usize,
    unreflected_sum: f32,
    unreflected_nodes: Vec<NodeId>,
}

impl From<StoreData> for AssociativeMemory {
    fn from(data: StoreData) -> Self {
        let mut store = Self {
            nodes: data.nodes,
            next_id: data.next_id,
            embedding_dims: data.embedding_dims,
            unreflected_sum: data.unreflected_sum,
            unreflected_nodes: data.unreflected_nodes,
            keyword_index: HashMap::new(),
            id_index: HashMap::new(),
            poignancy_range: None,
        };
        store.rebuild_indexes();
        store
    }
}

impl AssociativeMemory {
    /// Create an empty store accepting embeddings of `embedding_dims`.
    #[must_use]
    pub fn new(embedding_dims: usize) -> Self {
        Self {
            nodes: Vec::new(),
            next_id: 0,
            embedding_dims,
            unreflected_sum: 0.0,
            unreflected_nodes: Vec::new(),
            keyword_index: HashMap::new(),
            id_index: HashMap::new(),
            poignancy_range: None,
        }
    }

    /// Append a node, assigning its id, timestamps, and keywords.
    ///
    /// Updates the keyword index and adds the node's poignancy to the
    /// unreflected-importance accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Schema`] if the draft's embedding has the
    /// wrong dimensionality or a `filling` link references an unknown id.
    pub fn append(&mut self, draft: NodeDraft, at: Tick) -> Result<&MemoryNode> {
        if let Some(embedding) = &draft.embedding {
            if embedding.dimensions() != self.embedding_dims {
                return Err(EngineError::Schema {
                    reason: format!(
                        "embedding has {} dimensions, store expects {}",
                        embedding.dimensions(),
                        self.embedding_dims
                    ),
                });
            }
        }
        for source in &draft.filling {
            if !self.id_index.contains_key(source) {
                return Err(EngineError::Schema {
                    reason: format!("filling references unknown node {source}"),
                });
            }
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let poignancy = draft.poignancy.clamp(POIGNANCY_MIN, POIGNANCY_MAX);
        let keywords =
            keywords::extract(&draft.subject, &draft.predicate, &draft.object, &draft.description);

        let node = MemoryNode {
            id,
            kind: draft.kind,
            created_at: at,
            last_accessed_at: at,
            subject: draft.subject,
            predicate: draft.predicate,
            object: draft.object,
            description: draft.description,
            embedding: draft.embedding,
            poignancy,
            keywords,
            filling: draft.filling,
        };

        for keyword in &node.keywords {
            self.keyword_index.entry(keyword.clone()).or_default().insert(id);
        }
        self.id_index.insert(id, self.nodes.len());
        self.poignancy_range = Some(match self.poignancy_range {
            Some((lo, hi)) => (lo.min(poignancy), hi.max(poignancy)),
            None => (poignancy, poignancy),
        });
        self.unreflected_sum += poignancy;
        self.unreflected_nodes.push(id);

        debug!(node = %id, kind = ?node.kind, poignancy, "appended memory node");
        self.nodes.push(node);
        Ok(self.nodes.last().unwrap_or_else(|| unreachable!("just pushed")))
    }

    /// Ids of nodes carrying `keyword` (already-normalized form).
    ///
    /// Unknown keywords yield an empty set, not an error.
    #[must_use]
    pub fn get_by_keyword(&self, keyword: &str) -> BTreeSet<NodeId> {
        self.keyword_index.get(keyword).cloned().unwrap_or_default()
    }

    /// Bump a node's `last_accessed_at`.
    ///
    /// Last-write-wins via `max`, so concurrent touches are idempotent —
    /// recency only needs "at least this recent."
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NodeNotFound`] for unknown ids.
    pub fn touch(&mut self, id: NodeId, at: Tick) -> Result<()> {
        let position = *self.id_index.get(&id).ok_or(EngineError::NodeNotFound(id))?;
        let node = &mut self.nodes[position];
        node.last_accessed_at = node.last_accessed_at.max(at);
        Ok(())
    }

    /// Return and reset the unreflected-importance accumulator.
    ///
    /// Called only by the reflection trigger once a cycle actually runs.
    pub fn drain_unreflected(&mut self) -> (f32, Vec<NodeId>) {
        let sum = std::mem::take(&mut self.unreflected_sum);
        let nodes = std::mem::take(&mut self.unreflected_nodes);
        (sum, nodes)
    }

    /// Current unreflected-importance sum, without draining.
    #[must_use]
    pub fn unreflected_importance(&self) -> f32 {
        self.unreflected_sum
    }

    /// Ids appended since the last reflection, oldest first.
    #[must_use]
    pub fn unreflected_nodes(&self) -> &[NodeId] {
        &self.unreflected_nodes
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.id_index.get(&id).map(|&position| &self.nodes[position])
    }

    /// All nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.iter()
    }

    /// The `count` most recent nodes of `kind`, newest first.
    #[must_use]
    pub fn latest_of_kind(&self, kind: MemoryKind, count: usize) -> Vec<&MemoryNode> {
        self.nodes.iter().rev().filter(|n| n.kind == kind).take(count).collect()
    }

    /// Number of stored nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Embedding dimensionality this store accepts.
    #[must_use]
    pub fn embedding_dims(&self) -> usize {
        self.embedding_dims
    }

    /// Observed `(min, max)` poignancy, or `None` for an empty store.
    #[must_use]
    pub fn poignancy_range(&self) -> Option<(f32, f32)> {
        self.poignancy_range
    }

    /// Rebuild the keyword/id indexes and poignancy extremes from the
    /// node list. Used after deserialization.
    fn rebuild_indexes(&mut self) {
        self.keyword_index.clear();
        self.id_index.clear();
        self.poignancy_range = None;
        for (position, node) in self.nodes.iter().enumerate() {
            for keyword in &node.keywords {
                self.keyword_index.entry(keyword.clone()).or_default().insert(node.id);
            }
            self.id_index.insert(node.id, position);
            self.poignancy_range = Some(match self.poignancy_range {
                Some((lo, hi)) => (lo.min(node.poignancy), hi.max(node.poignancy)),
                None => (node.poignancy, node.poignancy),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AssociativeMemory {
        AssociativeMemory::new(3)
    }

    #[test]
    fn append_assigns_monotonic_ids_and_timestamps() {
        let mut mem = store();
        let a = mem
            .append(NodeDraft::event("alice", "is watering", "plants", "Alice waters the plants", 4.0), Tick(5))
            .expect("append")
            .id;
        let b = mem
            .append(NodeDraft::event("bob", "is cooking", "soup", "Bob cooks soup", 6.0), Tick(6))
            .expect("append")
            .id;
        assert!(b > a);
        let node = mem.node(a).expect("node");
        assert_eq!(node.created_at, Tick(5));
        assert_eq!(node.last_accessed_at, Tick(5));
    }

    #[test]
    fn every_extracted_keyword_indexes_the_node() {
        let mut mem = store();
        let id = mem
            .append(NodeDraft::event("klaus", "is reading", "paper", "Klaus reads a paper", 5.0), Tick(1))
            .expect("append")
            .id;
        let node = mem.node(id).expect("node").clone();
        assert!(!node.keywords.is_empty());
        for keyword in &node.keywords {
            assert!(mem.get_by_keyword(keyword).contains(&id), "missing index for {keyword}");
        }
    }

    #[test]
    fn unknown_keyword_is_empty_not_error() {
        let mem = store();
        assert!(mem.get_by_keyword("nonexistent").is_empty());
    }

    #[test]
    fn accumulator_sums_then_drains_to_zero() {
        let mut mem = store();
        for (i, p) in [5.0, 8.0, 6.0].into_iter().enumerate() {
            mem.append(NodeDraft::event("x", "did", "y", format!("event {i}"), p), Tick(i as u64))
                .expect("append");
        }
        assert!((mem.unreflected_importance() - 19.0).abs() < f32::EPSILON);
        let (sum, nodes) = mem.drain_unreflected();
        assert!((sum - 19.0).abs() < f32::EPSILON);
        assert_eq!(nodes.len(), 3);
        assert!((mem.unreflected_importance() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn wrong_embedding_dimensionality_is_a_schema_error() {
        let mut mem = store();
        let draft = NodeDraft::event("a", "b", "c", "d", 5.0).with_embedding(Embedding(vec![1.0, 0.0]));
        let err = mem.append(draft, Tick(0)).expect_err("must reject");
        assert!(matches!(err, EngineError::Schema { .. }));
        assert_eq!(mem.len(), 0);
        assert!((mem.unreflected_importance() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn dangling_filling_is_a_schema_error() {
        let mut mem = store();
        let draft = NodeDraft::thought("a thought", 5.0, vec![NodeId(99)]);
        assert!(matches!(mem.append(draft, Tick(0)), Err(EngineError::Schema { .. })));
    }

    #[test]
    fn filling_links_resolve_through_the_store() {
        let mut mem = store();
        let a = mem
            .append(NodeDraft::event("a", "did", "x", "first", 3.0), Tick(0))
            .expect("append")
            .id;
        let b = mem
            .append(NodeDraft::event("a", "did", "y", "second", 3.0), Tick(1))
            .expect("append")
            .id;
        let thought = mem
            .append(NodeDraft::thought("a pattern", 7.0, vec![a, b]), Tick(2))
            .expect("append")
            .clone();
        assert_eq!(thought.filling, vec![a, b]);
        for source in &thought.filling {
            assert!(mem.node(*source).is_some());
        }
    }

    #[test]
    fn touch_is_last_write_wins() {
        let mut mem = store();
        let id = mem
            .append(NodeDraft::event("a", "b", "c", "d", 5.0), Tick(0))
            .expect("append")
            .id;
        mem.touch(id, Tick(10)).expect("touch");
        mem.touch(id, Tick(7)).expect("earlier touch");
        assert_eq!(mem.node(id).expect("node").last_accessed_at, Tick(10));
        assert!(matches!(mem.touch(NodeId(42), Tick(1)), Err(EngineError::NodeNotFound(_))));
    }

    #[test]
    fn poignancy_is_clamped() {
        let mut mem = store();
        let lo = mem
            .append(NodeDraft::event("a", "b", "c", "d", -3.0), Tick(0))
            .expect("append")
            .poignancy;
        let hi = mem
            .append(NodeDraft::event("a", "b", "c", "d", 42.0), Tick(0))
            .expect("append")
            .poignancy;
        assert!((lo - POIGNANCY_MIN).abs() < f32::EPSILON);
        assert!((hi - POIGNANCY_MAX).abs() < f32::EPSILON);
        assert_eq!(mem.poignancy_range(), Some((POIGNANCY_MIN, POIGNANCY_MAX)));
    }

    #[test]
    fn serde_round_trip_rebuilds_indexes() {
        let mut mem = store();
        let id = mem
            .append(NodeDraft::event("klaus", "is reading", "paper", "Klaus reads", 5.0), Tick(1))
            .expect("append")
            .id;
        mem.append(NodeDraft::thought("reading matters", 8.0, vec![id]), Tick(2))
            .expect("append");

        let json = serde_json::to_string(&mem).expect("serialize");
        let restored: AssociativeMemory = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored.len(), mem.len());
        assert_eq!(restored.unreflected_importance(), mem.unreflected_importance());
        assert_eq!(restored.get_by_keyword("klaus"), mem.get_by_keyword("klaus"));
        assert_eq!(restored.poignancy_range(), mem.poignancy_range());
        // Ids keep working after restore.
        assert!(restored.node(id).is_some());
    }
}
