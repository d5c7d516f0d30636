//! Property-based tests for the hamlet engine.
//!
//! Verifies the structural invariants under random inputs: clamped
//! scores, monotonic ids, accumulator arithmetic, retrieval bounds and
//! determinism, and occupancy uniqueness under arbitrary move sequences.

use proptest::prelude::*;

use hamlet_core::config::{DistanceMetric, RetrievalConfig, RetrievalWeights};
use hamlet_core::embedding::{EmbeddingProvider, HashedEmbeddingProvider};
use hamlet_core::maze::Maze;
use hamlet_core::memory::{AssociativeMemory, NodeDraft, POIGNANCY_MAX, POIGNANCY_MIN};
use hamlet_core::retrieval::{scoring, RetrievalEngine};
use hamlet_core::types::{AgentId, NodeId, Tick, TilePos};

const DIMS: usize = 8;

fn arb_draft() -> impl Strategy<Value = NodeDraft> {
    (
        "[a-z]{3,8}",
        "[a-z]{3,8}( [a-z]{3,8}){0,2}",
        "[a-z]{3,8}",
        -50.0..50.0f32,
    )
        .prop_map(|(subject, predicate, object, poignancy)| {
            let description = format!("{subject} {predicate} {object}");
            NodeDraft::event(subject, predicate, object, description, poignancy)
        })
}

// ---------------------------------------------------------------------------
// Property: poignancy is always clamped, ids are monotonic
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn poignancy_clamped_and_ids_monotonic(drafts in prop::collection::vec(arb_draft(), 1..40)) {
        let mut store = AssociativeMemory::new(DIMS);
        let mut last_id = None;
        for (i, draft) in drafts.into_iter().enumerate() {
            let node = store.append(draft, Tick(i as u64)).expect("append");
            prop_assert!(node.poignancy >= POIGNANCY_MIN);
            prop_assert!(node.poignancy <= POIGNANCY_MAX);
            if let Some(last) = last_id {
                prop_assert!(node.id > last, "ids must be strictly increasing");
            }
            last_id = Some(node.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: accumulator equals the clamped poignancy sum until drained
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn accumulator_is_sum_until_drained(poignancies in prop::collection::vec(1.0..=10.0f32, 1..30)) {
        let mut store = AssociativeMemory::new(DIMS);
        let mut expected = 0.0f32;
        for (i, p) in poignancies.iter().enumerate() {
            store
                .append(NodeDraft::event("a", "did", "x", format!("event {i}"), *p), Tick(i as u64))
                .expect("append");
            expected += *p;
        }
        prop_assert!((store.unreflected_importance() - expected).abs() < 1e-3);

        let (sum, nodes) = store.drain_unreflected();
        prop_assert!((sum - expected).abs() < 1e-3);
        prop_assert_eq!(nodes.len(), poignancies.len());
        prop_assert!((store.unreflected_importance() - 0.0).abs() < f32::EPSILON);
    }
}

// ---------------------------------------------------------------------------
// Property: every extracted keyword indexes its node
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn keyword_index_is_complete(drafts in prop::collection::vec(arb_draft(), 1..20)) {
        let mut store = AssociativeMemory::new(DIMS);
        let mut ids = Vec::new();
        for (i, draft) in drafts.into_iter().enumerate() {
            ids.push(store.append(draft, Tick(i as u64)).expect("append").id);
        }
        for id in ids {
            let node = store.node(id).expect("node").clone();
            for keyword in &node.keywords {
                prop_assert!(store.get_by_keyword(keyword).contains(&id));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: retrieval returns min(K, candidates), sorted, deterministic
// ---------------------------------------------------------------------------

fn build_store(count: usize) -> AssociativeMemory {
    let embedder = HashedEmbeddingProvider::new(DIMS);
    let mut store = AssociativeMemory::new(DIMS);
    for i in 0..count {
        let description = format!("event number {i} in the square");
        let embedding = embedder.embed(&description).expect("embed");
        store
            .append(
                NodeDraft::event(
                    format!("agent{}", i % 5),
                    "did",
                    format!("thing {i}"),
                    description,
                    (i % 10) as f32 + 1.0,
                )
                .with_embedding(embedding),
                Tick(i as u64),
            )
            .expect("append");
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn retrieval_bounds_and_order(count in 0..60usize, top_k in 1..20usize) {
        let engine = RetrievalEngine::new(RetrievalConfig {
            top_k,
            ..RetrievalConfig::default()
        });
        let embedder = HashedEmbeddingProvider::new(DIMS);
        let mut store = build_store(count);

        let results = engine.retrieve(&mut store, &["the square".into()], &embedder, Tick(100));
        prop_assert_eq!(results.len(), top_k.min(count));
        for pair in results.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn retrieval_is_deterministic(count in 1..40usize, top_k in 1..10usize) {
        let engine = RetrievalEngine::new(RetrievalConfig {
            top_k,
            ..RetrievalConfig::default()
        });
        let embedder = HashedEmbeddingProvider::new(DIMS);
        // Identical stores, independently built: identical rankings.
        let mut store_a = build_store(count);
        let mut store_b = build_store(count);

        let a: Vec<NodeId> = engine
            .retrieve(&mut store_a, &["the square".into()], &embedder, Tick(77))
            .into_iter()
            .map(|r| r.node_id)
            .collect();
        let b: Vec<NodeId> = engine
            .retrieve(&mut store_b, &["the square".into()], &embedder, Tick(77))
            .into_iter()
            .map(|r| r.node_id)
            .collect();
        prop_assert_eq!(a, b);
    }
}

// ---------------------------------------------------------------------------
// Property: scoring stays finite and bounded over the whole weight range
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn blended_score_is_finite_and_bounded(
        recency_w in 0.0..10.0f64,
        importance_w in 0.0..10.0f64,
        relevance_w in 0.0..10.0f64,
        half_life in 0.0..500.0f64,
        age in 0..10_000u64,
        poignancy in 1.0..=10.0f32,
    ) {
        let weights = RetrievalWeights {
            recency: recency_w,
            importance: importance_w,
            relevance: relevance_w,
        };
        let mut store = AssociativeMemory::new(DIMS);
        let node = store
            .append(NodeDraft::event("a", "did", "x", "an event", poignancy), Tick(0))
            .expect("append")
            .clone();

        let breakdown = scoring::compute_breakdown(
            &node,
            &[],
            Tick(age),
            store.poignancy_range(),
            half_life,
            &weights,
        );
        let total = breakdown.total();
        prop_assert!(total.is_finite());
        prop_assert!(total >= 0.0);
        prop_assert!(total <= recency_w + importance_w + relevance_w + 1e-9);
    }
}

// ---------------------------------------------------------------------------
// Property: occupancy stays unique under arbitrary move sequences
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn occupancy_unique_under_random_moves(
        moves in prop::collection::vec((0..4usize, 0..8usize), 1..120),
    ) {
        let maze = Maze::open("w", 6, 6).expect("maze");
        let starts = [
            TilePos::new(0, 0),
            TilePos::new(5, 0),
            TilePos::new(0, 5),
            TilePos::new(5, 5),
        ];
        let mut positions = starts;
        for (i, &pos) in starts.iter().enumerate() {
            maze.place_agent(AgentId(i as u32), pos).expect("place");
        }

        const STEPS: [(i32, i32); 8] =
            [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];
        for (who, dir) in moves {
            let from = positions[who];
            let (dx, dy) = STEPS[dir];
            let to = TilePos::new(from.x + dx, from.y + dy);
            if maze.can_move(from, to)
                && maze.commit_move(AgentId(who as u32), from, to).is_ok()
            {
                positions[who] = to;
            }

            // Invariant: one occupant per tile, grid agrees with our
            // shadow positions.
            let snapshot = maze.occupancy_snapshot();
            prop_assert_eq!(snapshot.len(), 4);
            let mut tiles: Vec<TilePos> = snapshot.iter().map(|(t, _)| *t).collect();
            tiles.dedup();
            prop_assert_eq!(tiles.len(), 4, "two agents on one tile");
            for (tile, agent) in snapshot {
                prop_assert_eq!(positions[agent.0 as usize], tile);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: perception neighborhood size matches the metric
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn neighborhood_sizes_match_metric(radius in 0u32..4) {
        let maze = Maze::open("w", 40, 40).expect("maze");
        let center = TilePos::new(20, 20);
        let chebyshev = maze.neighbors(center, radius, DistanceMetric::Chebyshev);
        let manhattan = maze.neighbors(center, radius, DistanceMetric::Manhattan);

        let side = 2 * radius as usize + 1;
        prop_assert_eq!(chebyshev.len(), side * side);
        // Manhattan diamond: r^2 + (r+1)^2 tiles.
        let r = radius as usize;
        prop_assert_eq!(manhattan.len(), r * r + (r + 1) * (r + 1));
    }
}
