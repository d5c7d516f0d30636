//! Perception — what an agent notices around itself each tick.
//!
//! Pure and local: reads the maze and the other agents' public state,
//! writes nothing. The scheduler turns the returned percepts into event
//! nodes during the write-back phase.

use serde::{Deserialize, Serialize};

use crate::config::PerceptionConfig;
use crate::maze::Maze;
use crate::memory::{AssociativeMemory, MemoryKind};
use crate::types::{AgentId, TilePos};

/// The publicly perceivable side of an agent: where it is and what it
/// appears to be doing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentView {
    /// Whose view this is.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Tile the agent stands on.
    pub tile: TilePos,
    /// Current action description.
    pub action: String,
}

/// One noticed happening, ready to become an event node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percept {
    /// Triple subject — the perceived agent's name.
    pub subject: String,
    /// Triple predicate.
    pub predicate: String,
    /// Triple object.
    pub object: String,
    /// Natural-language description.
    pub description: String,
    /// Where it was seen.
    pub tile: TilePos,
    /// Distance from the observer, in the configured metric.
    pub distance: u32,
    /// The perceived agent.
    pub seen_agent: AgentId,
}

/// Perceive nearby agents from `observer`'s position.
///
/// Bounded by the perception radius, capped at the attention bandwidth
/// (nearest first), and filtered against the observer's most recent event
/// nodes so the same ongoing action is not re-remembered every tick.
///
/// Deterministic: candidates sort by `(distance, y, x, id)` before the
/// bandwidth cap applies.
#[must_use]
pub fn perceive(
    observer: &AgentView,
    others: &[AgentView],
    maze: &Maze,
    store: &AssociativeMemory,
    config: &PerceptionConfig,
) -> Vec<Percept> {
    let visible = maze.neighbors(observer.tile, config.vision_radius, config.metric);

    let mut candidates: Vec<Percept> = others
        .iter()
        .filter(|other| other.id != observer.id && visible.contains(&other.tile))
        .map(|other| {
            let distance = match config.metric {
                crate::config::DistanceMetric::Chebyshev => observer.tile.chebyshev(other.tile),
                crate::config::DistanceMetric::Manhattan => observer.tile.manhattan(other.tile),
            };
            Percept {
                subject: other.name.clone(),
                predicate: "is".to_string(),
                object: other.action.clone(),
                description: format!("{} is {}", other.name, other.action),
                tile: other.tile,
                distance,
                seen_agent: other.id,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| (a.tile.y, a.tile.x).cmp(&(b.tile.y, b.tile.x)))
            .then_with(|| a.seen_agent.cmp(&b.seen_agent))
    });

    // Novelty: skip anything already among the most recent event nodes.
    let recent = store.latest_of_kind(MemoryKind::Event, config.retention);
    candidates.retain(|percept| {
        !recent.iter().any(|node| {
            node.subject == percept.subject
                && node.predicate == percept.predicate
                && node.object == percept.object
        })
    });

    candidates.truncate(config.attention_bandwidth);
    candidates
}
