//! Per-agent working state ("scratch").
//!
//! Holds everything about an agent that isn't a memory: where it stands,
//! what it is doing, what it plans to do next, and where it is in the
//! per-tick cycle. Never shared between agents; cloned at the start of a
//! tick so a failed cycle can roll back wholesale.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{SpatialAddress, Tick, TilePos};

/// Where an agent currently is in its per-tick cycle.
///
/// The scheduler drives every transition; `AwaitingDecision` is the only
/// state that suspends on the external oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Between ticks, nothing in flight.
    #[default]
    Idle,
    /// Reading nearby tiles and agents.
    Perceiving,
    /// Querying associative memory.
    Retrieving,
    /// Suspended on the reasoning oracle.
    AwaitingDecision,
    /// Moving / performing the current action.
    Acting,
    /// Appending new memory nodes.
    WritingMemory,
    /// Running a reflection cycle.
    Reflecting,
}

/// One planned or in-progress action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Short description ("drinking coffee", "walking to the park").
    pub description: String,
    /// Where the action happens; `None` means wherever the agent stands.
    pub target: Option<SpatialAddress>,
    /// Ticks left until the action completes.
    pub remaining_ticks: u32,
}

impl ActionDescriptor {
    /// Create an action descriptor.
    #[must_use]
    pub fn new(description: impl Into<String>, target: Option<SpatialAddress>, duration: u32) -> Self {
        Self {
            description: description.into(),
            target,
            remaining_ticks: duration,
        }
    }

    /// The deterministic do-nothing action used when there is nothing to
    /// continue and no decision could be obtained.
    #[must_use]
    pub fn idle(duration: u32) -> Self {
        Self::new("idle", None, duration)
    }
}

/// Per-agent mutable working state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingState {
    /// The tile the agent stands on.
    pub current_tile: TilePos,
    /// Cycle phase, driven by the scheduler.
    pub phase: AgentPhase,
    /// The action in progress, if any.
    pub current_action: Option<ActionDescriptor>,
    /// Pending actions, front first.
    pub plan_queue: VecDeque<ActionDescriptor>,
    /// Remaining steps toward the current action's target tile.
    pub route: VecDeque<TilePos>,
    /// Mirror of the store's unreflected-importance accumulator, used
    /// for threshold checks without borrowing the store.
    pub unreflected_importance: f32,
    /// When this agent last completed a reflection cycle.
    pub last_reflection_tick: Tick,
}

impl WorkingState {
    /// Fresh working state for an agent standing on `tile`.
    #[must_use]
    pub fn new(tile: TilePos) -> Self {
        Self {
            current_tile: tile,
            phase: AgentPhase::Idle,
            current_action: None,
            plan_queue: VecDeque::new(),
            route: VecDeque::new(),
            unreflected_importance: 0.0,
            last_reflection_tick: Tick(0),
        }
    }

    /// Whether the agent needs a fresh decision this tick: no action in
    /// progress and nothing queued.
    #[must_use]
    pub fn needs_decision(&self) -> bool {
        self.current_action.is_none() && self.plan_queue.is_empty()
    }

    /// Install a new current action, clearing any stale route.
    pub fn begin_action(&mut self, action: ActionDescriptor) {
        self.current_action = Some(action);
        self.route.clear();
    }

    /// Queue an action behind the current one.
    pub fn enqueue_action(&mut self, action: ActionDescriptor) {
        self.plan_queue.push_back(action);
    }

    /// Burn one tick off the current action; when it completes, promote
    /// the next queued action. Returns the completed action, if any.
    pub fn tick_action(&mut self) -> Option<ActionDescriptor> {
        let action = self.current_action.as_mut()?;
        action.remaining_ticks = action.remaining_ticks.saturating_sub(1);
        if action.remaining_ticks > 0 {
            return None;
        }
        let finished = self.current_action.take();
        if let Some(next) = self.plan_queue.pop_front() {
            self.begin_action(next);
        } else {
            self.route.clear();
        }
        finished
    }

    /// The current action's description, or "idle".
    #[must_use]
    pub fn action_description(&self) -> &str {
        self.current_action.as_ref().map_or("idle", |a| a.description.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_needs_a_decision() {
        let ws = WorkingState::new(TilePos::new(3, 4));
        assert!(ws.needs_decision());
        assert_eq!(ws.phase, AgentPhase::Idle);
        assert_eq!(ws.action_description(), "idle");
    }

    #[test]
    fn tick_action_counts_down_and_promotes_queue() {
        let mut ws = WorkingState::new(TilePos::new(0, 0));
        ws.begin_action(ActionDescriptor::new("paint", None, 2));
        ws.enqueue_action(ActionDescriptor::new("clean brushes", None, 1));

        assert!(ws.tick_action().is_none());
        assert_eq!(ws.current_action.as_ref().map(|a| a.remaining_ticks), Some(1));

        let finished = ws.tick_action().expect("finished");
        assert_eq!(finished.description, "paint");
        assert_eq!(ws.action_description(), "clean brushes");
        assert!(!ws.needs_decision());

        ws.tick_action();
        assert!(ws.needs_decision());
    }

    #[test]
    fn begin_action_clears_route() {
        let mut ws = WorkingState::new(TilePos::new(0, 0));
        ws.route.push_back(TilePos::new(1, 0));
        ws.begin_action(ActionDescriptor::idle(3));
        assert!(ws.route.is_empty());
    }
}
