//! hamlet benchmark suite.
//!
//! Rough targets for real-time use at small-town scale:
//!   node_append_single ............ < 10μs
//!   retrieval_top10_from_500 ...... < 1ms
//!   maze_path_40x40 ............... < 200μs
//!   full_tick_10_agents_offline ... < 5ms

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use hamlet_core::config::{RetrievalConfig, SimConfig};
use hamlet_core::embedding::{EmbeddingProvider, HashedEmbeddingProvider};
use hamlet_core::maze::{Maze, MazeLayout};
use hamlet_core::memory::{AssociativeMemory, NodeDraft};
use hamlet_core::oracle::OfflineOracle;
use hamlet_core::retrieval::RetrievalEngine;
use hamlet_core::scheduler::TickScheduler;
use hamlet_core::types::{Tick, TilePos};

const DIMS: usize = 64;

fn make_draft(i: usize, embedder: &HashedEmbeddingProvider) -> NodeDraft {
    let description = format!("villager {} did chore number {i} near the well", i % 7);
    let embedding = embedder.embed(&description).expect("embed");
    NodeDraft::event(
        format!("villager {}", i % 7),
        "is doing",
        format!("chore {i}"),
        description,
        (i % 10) as f32 + 1.0,
    )
    .with_embedding(embedding)
}

/// Benchmark: single node append.
fn bench_node_append(c: &mut Criterion) {
    let embedder = HashedEmbeddingProvider::new(DIMS);
    c.bench_function("node_append_single", |b| {
        let mut store = AssociativeMemory::new(DIMS);
        let mut i = 0usize;
        b.iter(|| {
            store
                .append(black_box(make_draft(i, &embedder)), Tick(i as u64))
                .expect("append");
            i += 1;
        });
    });
}

/// Benchmark: top-10 retrieval from 500 nodes.
fn bench_retrieval(c: &mut Criterion) {
    let embedder = HashedEmbeddingProvider::new(DIMS);
    let mut store = AssociativeMemory::new(DIMS);
    for i in 0..500 {
        store.append(make_draft(i, &embedder), Tick(i as u64)).expect("append");
    }
    let engine = RetrievalEngine::new(RetrievalConfig::default());

    c.bench_function("retrieval_top10_from_500", |b| {
        b.iter(|| {
            let results = engine.retrieve(
                black_box(&mut store),
                black_box(&["chores near the well".to_string()]),
                &embedder,
                Tick(1_000),
            );
            black_box(results);
        });
    });
}

/// Benchmark: BFS pathfinding across a 40x40 grid with scattered walls.
fn bench_pathfinding(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let blocked: Vec<TilePos> = (0..200)
        .map(|_| TilePos::new(rng.gen_range(1..39), rng.gen_range(1..39)))
        .collect();
    let maze = Maze::from_layout(
        &MazeLayout {
            world: "w".into(),
            width: 40,
            height: 40,
            blocked,
            regions: vec![],
        },
        false,
    )
    .expect("maze");

    c.bench_function("maze_path_40x40", |b| {
        b.iter(|| {
            let path = maze.shortest_path(black_box(TilePos::new(0, 0)), black_box(TilePos::new(39, 39)));
            black_box(path);
        });
    });
}

/// Benchmark: a full tick for 10 agents with no oracle (fallback path).
fn bench_full_tick(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut config = SimConfig::default();
    config.embedding.dimensions = DIMS;

    c.bench_function("full_tick_10_agents_offline", |b| {
        b.iter_batched(
            || {
                let maze = Arc::new(Maze::open("w", 30, 30).expect("maze"));
                let mut scheduler = TickScheduler::new(
                    maze,
                    config.clone(),
                    OfflineOracle,
                    HashedEmbeddingProvider::new(DIMS),
                );
                for i in 0..10 {
                    scheduler
                        .register_agent(
                            format!("agent {i}"),
                            "a villager",
                            TilePos::new((i * 3) as i32, (i % 5) as i32),
                        )
                        .expect("register");
                }
                scheduler
            },
            |mut scheduler| {
                runtime.block_on(async {
                    scheduler.run_tick().await.expect("tick");
                });
                black_box(scheduler);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_node_append,
    bench_retrieval,
    bench_pathfinding,
    bench_full_tick
);
criterion_main!(benches);
