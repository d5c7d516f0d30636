//! Error types for the hamlet engine.

use thiserror::Error;

use crate::oracle::OracleFailure;
use crate::types::{NodeId, TilePos};

/// Top-level error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A memory node draft was structurally invalid (wrong embedding
    /// dimensionality, dangling derived-from link). Fatal to that append
    /// only; the tick continues for other agents.
    #[error("Malformed memory node: {reason}")]
    Schema {
        /// What was wrong with the draft.
        reason: String,
    },

    /// A memory with the given ID was not found in the store.
    #[error("Memory node not found: {0}")]
    NodeNotFound(NodeId),

    /// A spatial query left the grid extent.
    #[error("Tile ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Queried column.
        x: i32,
        /// Queried row.
        y: i32,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// An address path did not resolve to any tiles.
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    /// A move commit lost the race for its destination tile.
    #[error("Destination tile {0} is occupied")]
    Collision(TilePos),

    /// The reasoning oracle failed; the caller falls back to a
    /// deterministic default action.
    #[error("Oracle failure: {0}")]
    Oracle(#[from] OracleFailure),

    /// The embedding provider is unavailable; relevance scoring degrades
    /// to a neutral value instead of failing.
    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Snapshot encode/decode failure.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled; the in-flight tick was rolled back.
    #[error("Run cancelled during tick {tick}")]
    Cancelled {
        /// The tick that was being processed when cancellation was observed.
        tick: u64,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
