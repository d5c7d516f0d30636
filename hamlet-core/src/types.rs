//! Core type definitions for the hamlet engine.
//!
//! All types are serializable so that world state can round-trip through
//! the snapshot layer without loss.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for an agent in the simulation.
///
/// Assigned densely at registration time; per-tick processing order is the
/// ascending `AgentId` order, which keeps re-runs reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Unique identifier for a memory node.
///
/// Monotonically assigned per store; never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A discrete simulation step — the unit of logical time.
///
/// Recency decay, action durations, and scheduling all count in ticks;
/// wall-clock time never enters the engine's state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Ticks elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The following tick.
    #[must_use]
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A tile coordinate on the grid. `(0, 0)` is the top-left corner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
}

impl TilePos {
    /// Create a tile position.
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to `other`.
    #[must_use]
    pub fn chebyshev(self, other: TilePos) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Manhattan (taxicab) distance to `other`.
    #[must_use]
    pub fn manhattan(self, other: TilePos) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A fully-qualified place in the world's 4-level name hierarchy:
/// world → sector → arena → game object.
///
/// Deeper levels are optional: a tile out on the street carries only a
/// world (and usually sector) name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpatialAddress {
    /// World name (the whole map).
    pub world: String,
    /// Sector name, unique within the world.
    pub sector: Option<String>,
    /// Arena name, unique within its sector.
    pub arena: Option<String>,
    /// Game object name, unique within its arena.
    pub object: Option<String>,
}

impl SpatialAddress {
    /// An address naming only the world.
    #[must_use]
    pub fn world(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            sector: None,
            arena: None,
            object: None,
        }
    }

    /// Extend this address with a sector name.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Extend this address with an arena name.
    #[must_use]
    pub fn with_arena(mut self, arena: impl Into<String>) -> Self {
        self.arena = Some(arena.into());
        self
    }

    /// Extend this address with a game-object name.
    #[must_use]
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Parse a colon-separated path (`world:sector:arena:object`).
    ///
    /// Missing trailing levels are allowed; empty segments are not.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut parts = path.split(':').map(str::trim);
        let world = parts.next().filter(|s| !s.is_empty())?;
        let mut addr = SpatialAddress::world(world);
        for (level, part) in parts.enumerate() {
            if part.is_empty() {
                return None;
            }
            match level {
                0 => addr.sector = Some(part.to_string()),
                1 => addr.arena = Some(part.to_string()),
                2 => addr.object = Some(part.to_string()),
                _ => return None,
            }
        }
        Some(addr)
    }

    /// Number of named levels (1 for world-only, 4 for a full path).
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + usize::from(self.sector.is_some())
            + usize::from(self.arena.is_some())
            + usize::from(self.object.is_some())
    }
}

impl fmt::Display for SpatialAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.world)?;
        if let Some(s) = &self.sector {
            write!(f, ":{s}")?;
        }
        if let Some(a) = &self.arena {
            write!(f, ":{a}")?;
        }
        if let Some(o) = &self.object {
            write!(f, ":{o}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory Embedding Vector
// ---------------------------------------------------------------------------

/// A dense vector embedding for semantic similarity search.
///
/// Dimensionality is fixed per run (see `EmbeddingConfig`); stores reject
/// nodes whose embedding does not match it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Cosine similarity between two embeddings, in \[-1.0, 1.0\].
    ///
    /// Returns 0.0 for mismatched dimensions or zero-magnitude vectors.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }
        let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom < f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Dimensionality of the embedding.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }
}

// ---------------------------------------------------------------------------
// Retrieval Score
// ---------------------------------------------------------------------------

/// Composite score used to rank memories during retrieval.
///
/// Wraps `OrderedFloat` so scores have a total order and can be sorted
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetrievalScore(pub OrderedFloat<f64>);

impl RetrievalScore {
    /// Create a retrieval score from a raw f64.
    #[must_use]
    pub fn new(score: f64) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}
