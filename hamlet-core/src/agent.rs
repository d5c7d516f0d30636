//! The per-agent aggregate: identity, memory store, and working state.

use serde::{Deserialize, Serialize};

use crate::memory::AssociativeMemory;
use crate::scratch::WorkingState;
use crate::types::{AgentId, TilePos};

/// One autonomous agent: a name and persona for prompting, an exclusively
/// owned associative memory store, and mutable working state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Registration-order identifier; also the tick processing order.
    pub id: AgentId,
    /// Display name, used as the subject of the agent's own events.
    pub name: String,
    /// One-paragraph identity summary fed into decision prompts.
    pub persona: String,
    /// The agent's memories. Never shared; cross-agent references are by
    /// copy.
    pub store: AssociativeMemory,
    /// Working state, mutated every tick.
    pub scratch: WorkingState,
}

impl Agent {
    /// Create an agent standing on `tile` with an empty store.
    #[must_use]
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        persona: impl Into<String>,
        tile: TilePos,
        embedding_dims: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            persona: persona.into(),
            store: AssociativeMemory::new(embedding_dims),
            scratch: WorkingState::new(tile),
        }
    }
}
