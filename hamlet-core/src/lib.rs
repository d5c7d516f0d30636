//! # hamlet-core
//!
//! Agent memory & world-coordination engine for tile-grid social
//! simulations: many autonomous agents share one town, accumulate
//! experience as structured memories, retrieve relevant past experience
//! to condition behavior, and move under collision constraints — all in
//! lock-step discrete ticks.
//!
//! The engine is built from:
//!
//! - [`memory::AssociativeMemory`] — per-agent append-only memory with a
//!   keyword index and an unreflected-importance accumulator
//! - [`retrieval::RetrievalEngine`] — blended recency / importance /
//!   relevance ranking with deterministic ordering
//! - [`maze::Maze`] — the hierarchical spatial index, occupancy grid,
//!   and collision-aware navigation
//! - [`scheduler::TickScheduler`] — the deterministic per-tick
//!   perceive → retrieve → decide → act → remember cycle
//! - [`reflection`] — threshold-triggered synthesis of higher-level
//!   thoughts
//! - [`snapshot`] — restartable world snapshots (bincode or SQLite)
//!
//! Natural-language reasoning itself is external: an injected
//! [`oracle::ReasoningOracle`] receives prompts and token budgets, and
//! the engine parses only the typed fields it needs from the replies.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod embedding;
pub mod error;
pub mod maze;
pub mod memory;
pub mod observer;
pub mod oracle;
pub mod perceive;
pub mod prompts;
pub mod reflection;
pub mod retrieval;
pub mod scheduler;
pub mod scratch;
pub mod snapshot;
pub mod types;

pub use config::SimConfig;
pub use error::{EngineError, Result};
pub use maze::{Maze, MazeLayout};
pub use memory::{AssociativeMemory, MemoryKind, MemoryNode, NodeDraft};
pub use scheduler::TickScheduler;
pub use types::*;
