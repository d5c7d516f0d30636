//! The tick scheduler — advances the whole world by one discrete step.
//!
//! Agents are processed in fixed `AgentId` order through three phases:
//!
//! 1. **Decide** — perceive, retrieve, and (when an agent has no plan
//!    left) consult the oracle for a fresh action. The oracle call is the
//!    only suspension point; it runs under a timeout and holds no locks.
//! 2. **Commit** — move intents are applied one agent at a time through
//!    the maze's atomic `commit_move`; a lost race retries once with a
//!    fresh path and otherwise stays put.
//! 3. **Write-back** — new event nodes are appended, action durations
//!    burn down, and the reflection trigger is checked.
//!
//! Re-running a tick from the same snapshot with the same oracle replies
//! reproduces the same world. Cancellation between agents rolls every
//! agent back to its start-of-tick working state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::SimConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{EngineError, Result};
use crate::maze::Maze;
use crate::memory::NodeDraft;
use crate::observer::{AgentTickReport, Observer, TickSummary};
use crate::oracle::{generate_with_timeout, OracleRequest, ReasoningOracle};
use crate::perceive::{perceive, AgentView, Percept};
use crate::prompts::{self, Decision};
use crate::retrieval::RetrievalEngine;
use crate::scratch::{ActionDescriptor, AgentPhase, WorkingState};
use crate::snapshot::WorldSnapshot;
use crate::types::{AgentId, Tick, TilePos};

/// Poignancy for a deliberately chosen action when scoring fails.
pub const DEFAULT_EVENT_POIGNANCY: f32 = 4.0;
/// Poignancy for idling.
pub const IDLE_POIGNANCY: f32 = 1.0;
/// Poignancy for a perceived third-party event (not oracle-scored, to
/// bound call volume).
pub const PERCEPT_POIGNANCY: f32 = 3.0;

/// Cooperative cancellation for a running scheduler.
///
/// Observed between agents within a tick; pending oracle calls are
/// abandoned and every agent rolls back to its start-of-tick state.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The per-tick world coordinator.
pub struct TickScheduler<O, E> {
    maze: Arc<Maze>,
    agents: Vec<Agent>,
    oracle: O,
    embedder: E,
    retrieval: RetrievalEngine,
    config: SimConfig,
    tick: Tick,
    run_id: Uuid,
    observers: Vec<Box<dyn Observer>>,
    cancel: CancelHandle,
}

impl<O: ReasoningOracle, E: EmbeddingProvider> TickScheduler<O, E> {
    /// Create a scheduler over a loaded maze with injected capabilities.
    #[must_use]
    pub fn new(maze: Arc<Maze>, config: SimConfig, oracle: O, embedder: E) -> Self {
        let retrieval = RetrievalEngine::new(config.retrieval.clone());
        Self {
            maze,
            agents: Vec::new(),
            oracle,
            embedder,
            retrieval,
            config,
            tick: Tick(0),
            run_id: Uuid::new_v4(),
            observers: Vec::new(),
            cancel: CancelHandle::default(),
        }
    }

    /// Rebuild a scheduler from a snapshot taken at a tick boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot's occupancy doesn't fit the maze.
    pub fn from_snapshot(
        maze: Arc<Maze>,
        config: SimConfig,
        oracle: O,
        embedder: E,
        snapshot: WorldSnapshot,
    ) -> Result<Self> {
        maze.restore_occupancy(&snapshot.occupancy)?;
        let mut scheduler = Self::new(maze, config, oracle, embedder);
        scheduler.agents = snapshot.agents;
        scheduler.tick = snapshot.tick;
        scheduler.run_id = snapshot.run_id;
        Ok(scheduler)
    }

    /// Register an agent standing on `tile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tile is out of bounds, impassable, or
    /// occupied.
    pub fn register_agent(
        &mut self,
        name: impl Into<String>,
        persona: impl Into<String>,
        tile: TilePos,
    ) -> Result<AgentId> {
        let id = AgentId(self.agents.len() as u32);
        self.maze.place_agent(id, tile)?;
        self.agents.push(Agent::new(
            id,
            name,
            persona,
            tile,
            self.config.embedding.dimensions,
        ));
        Ok(id)
    }

    /// Attach a tick observer.
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// A handle that can cancel the run from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Last completed tick.
    #[must_use]
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// The registered agents, in processing order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Look up an agent.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// The shared maze.
    #[must_use]
    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    /// Capture a restartable snapshot. Only valid at tick boundaries,
    /// which is the only time callers can hold `&self` anyway.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            run_id: self.run_id,
            tick: self.tick,
            agents: self.agents.clone(),
            occupancy: self.maze.occupancy_snapshot(),
        }
    }

    /// Advance the world by `ticks` steps.
    ///
    /// # Errors
    ///
    /// Propagates cancellation and run-fatal errors; per-agent failures
    /// never abort the run.
    pub async fn run(&mut self, ticks: u64) -> Result<Vec<TickSummary>> {
        let mut summaries = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            summaries.push(self.run_tick().await?);
        }
        Ok(summaries)
    }

    /// Advance the world by `ticks` steps, saving a snapshot to `store`
    /// every `persistence.snapshot_interval_ticks` ticks (0 disables).
    ///
    /// # Errors
    ///
    /// Propagates cancellation and snapshot-store failures; a failed
    /// save is run-fatal since crash recovery depends on it.
    pub async fn run_with_snapshots(
        &mut self,
        ticks: u64,
        store: &crate::snapshot::SnapshotStore,
    ) -> Result<Vec<TickSummary>> {
        let interval = self.config.persistence.snapshot_interval_ticks;
        let mut summaries = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            summaries.push(self.run_tick().await?);
            if interval > 0 && self.tick.0 % interval == 0 {
                store.save(&self.snapshot())?;
            }
        }
        Ok(summaries)
    }

    /// Advance the world by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] when the cancel handle fired;
    /// all agents are rolled back to their start-of-tick state first.
    pub async fn run_tick(&mut self) -> Result<TickSummary> {
        let now = self.tick.next();
        let pre_tick: Vec<WorkingState> = self.agents.iter().map(|a| a.scratch.clone()).collect();
        let views: Vec<AgentView> = self
            .agents
            .iter()
            .map(|a| AgentView {
                id: a.id,
                name: a.name.clone(),
                tile: a.scratch.current_tile,
                action: a.scratch.action_description().to_string(),
            })
            .collect();

        let known_places = self
            .maze
            .addresses()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        // --- Phase 1: perceive / retrieve / decide ------------------------
        let mut percepts_per_agent: Vec<Vec<Percept>> = Vec::with_capacity(self.agents.len());
        let mut decided: Vec<bool> = vec![false; self.agents.len()];
        let mut fallback_used: Vec<bool> = vec![false; self.agents.len()];

        for i in 0..self.agents.len() {
            if self.cancel.is_cancelled() {
                self.rollback(&pre_tick);
                return Err(EngineError::Cancelled { tick: now.0 });
            }

            let agent = &mut self.agents[i];
            agent.scratch.phase = AgentPhase::Perceiving;
            let percepts =
                perceive(&views[i], &views, &self.maze, &agent.store, &self.config.perception);

            agent.scratch.phase = AgentPhase::Retrieving;
            let needs_decision = agent.scratch.needs_decision();
            let mut focal_terms: Vec<String> =
                percepts.iter().map(|p| p.description.clone()).collect();
            if needs_decision {
                focal_terms.push(format!("what should {} do next", agent.name));
            }
            let retrieved = if focal_terms.is_empty() {
                Vec::new()
            } else {
                self.retrieval.retrieve(&mut agent.store, &focal_terms, &self.embedder, now)
            };

            if needs_decision {
                agent.scratch.phase = AgentPhase::AwaitingDecision;
                let memories: Vec<String> = retrieved
                    .iter()
                    .filter_map(|r| agent.store.node(r.node_id))
                    .map(|n| n.description.clone())
                    .collect();
                let (decision, fell_back) = decide(
                    &self.oracle,
                    agent,
                    &self.maze,
                    &percepts,
                    &memories,
                    &known_places,
                    &self.config,
                    now,
                )
                .await;
                fallback_used[i] = fell_back;
                decided[i] = true;
                apply_decision(agent, decision, &self.maze, &self.config);
            }

            agent.scratch.phase = AgentPhase::Acting;
            percepts_per_agent.push(percepts);
        }

        if self.cancel.is_cancelled() {
            self.rollback(&pre_tick);
            return Err(EngineError::Cancelled { tick: now.0 });
        }

        // --- Phase 2: serialize move commits ------------------------------
        for i in 0..self.agents.len() {
            let agent = &mut self.agents[i];
            let Some(&step) = agent.scratch.route.front() else {
                continue;
            };
            let from = agent.scratch.current_tile;
            match self.maze.commit_move(agent.id, from, step) {
                Ok(()) => {
                    agent.scratch.route.pop_front();
                    agent.scratch.current_tile = step;
                }
                Err(EngineError::Collision(_)) => {
                    // Lost the race: re-path once toward the same goal,
                    // then give up and stay for this tick.
                    let goal = agent.scratch.route.back().copied().unwrap_or(step);
                    let retried = self
                        .maze
                        .shortest_path(from, goal)
                        .and_then(|path| path.first().copied())
                        .filter(|&alt| alt != step && self.maze.can_move(from, alt))
                        .and_then(|alt| {
                            self.maze.commit_move(agent.id, from, alt).ok().map(|()| alt)
                        });
                    match retried {
                        Some(alt) => {
                            agent.scratch.current_tile = alt;
                            agent.scratch.route =
                                self.maze.shortest_path(alt, goal).unwrap_or_default().into();
                            debug!(agent = %agent.id, %alt, "collision re-path");
                        }
                        None => {
                            debug!(agent = %agent.id, tile = %step, "move blocked; staying");
                        }
                    }
                }
                Err(err) => {
                    warn!(agent = %agent.id, error = %err, "move commit failed; staying");
                    agent.scratch.route.clear();
                }
            }
        }

        // --- Phase 3: memory write-back + reflection ----------------------
        let mut reports = Vec::with_capacity(self.agents.len());
        for i in 0..self.agents.len() {
            let agent = &mut self.agents[i];
            agent.scratch.phase = AgentPhase::WritingMemory;
            let mut memories_written = 0u32;

            if decided[i] {
                memories_written += write_own_action(
                    &self.oracle,
                    &self.embedder,
                    agent,
                    &self.config,
                    now,
                )
                .await;
            }
            for percept in &percepts_per_agent[i] {
                let draft = percept_draft(percept, &self.embedder);
                match agent.store.append(draft, now) {
                    Ok(_) => memories_written += 1,
                    Err(err) => {
                        // Fatal to this append only; the tick goes on.
                        warn!(agent = %agent.id, error = %err, "percept append rejected");
                    }
                }
            }

            agent.scratch.tick_action();
            agent.scratch.unreflected_importance = agent.store.unreflected_importance();

            agent.scratch.phase = AgentPhase::Reflecting;
            let outcome = crate::reflection::maybe_reflect(
                agent,
                &self.retrieval,
                &self.embedder,
                &self.oracle,
                &self.config,
                now,
            )
            .await;
            memories_written += outcome.new_thoughts.len() as u32;

            agent.scratch.phase = AgentPhase::Idle;
            reports.push(AgentTickReport {
                agent: agent.id,
                name: agent.name.clone(),
                action: agent.scratch.action_description().to_string(),
                tile: agent.scratch.current_tile,
                memories_written,
                reflected: outcome.fired,
                fallback_used: fallback_used[i],
            });
        }

        self.tick = now;
        let summary = TickSummary { tick: now, reports };
        for observer in &self.observers {
            observer.on_tick(&summary);
        }
        info!(tick = now.0, agents = summary.reports.len(), "tick complete");
        Ok(summary)
    }

    /// Restore every agent's working state to the start of the tick.
    fn rollback(&mut self, pre_tick: &[WorkingState]) {
        for (agent, saved) in self.agents.iter_mut().zip(pre_tick) {
            agent.scratch = saved.clone();
        }
        warn!(tick = self.tick.0 + 1, "tick cancelled; working state rolled back");
    }
}

// ---------------------------------------------------------------------------
// Decision helpers
// ---------------------------------------------------------------------------

/// Ask the oracle for the agent's next action; any failure falls back to
/// the deterministic idle action.
#[allow(clippy::too_many_arguments)]
async fn decide<O: ReasoningOracle>(
    oracle: &O,
    agent: &Agent,
    maze: &Maze,
    percepts: &[Percept],
    memories: &[String],
    known_places: &str,
    config: &SimConfig,
    now: Tick,
) -> (Decision, bool) {
    let current_address = maze
        .tile_address(agent.scratch.current_tile)
        .map_or_else(|_| "nowhere".to_string(), |a| a.to_string());
    let percept_lines = if percepts.is_empty() {
        "nothing of note".to_string()
    } else {
        percepts.iter().map(|p| p.description.clone()).collect::<Vec<_>>().join("\n")
    };
    let memory_lines = if memories.is_empty() {
        "none yet".to_string()
    } else {
        memories.join("\n")
    };

    let prompt = prompts::render_template(
        prompts::DECIDE_ACTION,
        &[
            ("agent_name", agent.name.as_str()),
            ("persona", agent.persona.as_str()),
            ("current_address", current_address.as_str()),
            ("tick", now.0.to_string().as_str()),
            ("percepts", percept_lines.as_str()),
            ("memories", memory_lines.as_str()),
            ("known_places", known_places),
        ],
    );

    let request = OracleRequest::json(
        prompt,
        config.oracle.decision_max_tokens,
        Duration::from_millis(config.oracle.request_timeout_ms),
    );
    match generate_with_timeout(oracle, request)
        .await
        .and_then(|reply| prompts::parse_decision(&reply.text))
    {
        Ok(decision) => (decision, false),
        Err(failure) => {
            warn!(agent = %agent.id, error = %failure, "decision fell back to idle");
            (
                Decision {
                    action: "idle".to_string(),
                    address: None,
                    duration: Some(config.movement.default_action_duration),
                },
                true,
            )
        }
    }
}

/// Install a decision into working state, resolving its address into a
/// route. Unresolvable addresses recover locally by staying in place.
fn apply_decision(agent: &mut Agent, decision: Decision, maze: &Maze, config: &SimConfig) {
    let duration = decision
        .duration
        .unwrap_or(config.movement.default_action_duration)
        .max(1);
    let action = ActionDescriptor::new(decision.action, decision.address.clone(), duration);
    agent.scratch.begin_action(action);

    let Some(address) = decision.address else {
        return;
    };
    match maze.resolve_address(&address) {
        Ok(tiles) => {
            let from = agent.scratch.current_tile;
            let target = tiles
                .iter()
                .copied()
                .find(|&t| matches!(maze.passable(t), Ok(true)));
            let route = target.and_then(|t| maze.shortest_path(from, t));
            match route {
                Some(path) => agent.scratch.route = path.into(),
                None => {
                    debug!(agent = %agent.id, %address, "target unreachable; acting in place");
                }
            }
        }
        Err(err) => {
            warn!(agent = %agent.id, %address, error = %err, "address did not resolve; acting in place");
        }
    }
}

// ---------------------------------------------------------------------------
// Write-back helpers
// ---------------------------------------------------------------------------

/// Append the event node recording the agent's freshly chosen action.
/// The triple and poignancy come from the oracle when it cooperates,
/// with deterministic fallbacks otherwise.
async fn write_own_action<O: ReasoningOracle, E: EmbeddingProvider>(
    oracle: &O,
    embedder: &E,
    agent: &mut Agent,
    config: &SimConfig,
    now: Tick,
) -> u32 {
    let action = agent.scratch.action_description().to_string();
    let description = format!("{} is {}", agent.name, action);
    let timeout = Duration::from_millis(config.oracle.request_timeout_ms);

    // Idling is fully deterministic: no oracle round-trips for it.
    let (subject, predicate, object, poignancy) = if action == "idle" {
        (agent.name.clone(), "is".to_string(), action.clone(), IDLE_POIGNANCY)
    } else {
        let triple_prompt = prompts::render_template(
            prompts::EVENT_TRIPLE,
            &[("agent_name", agent.name.as_str()), ("description", description.as_str())],
        );
        let (subject, predicate, object) = generate_with_timeout(
            oracle,
            OracleRequest::json(triple_prompt, config.oracle.scoring_max_tokens, timeout),
        )
        .await
        .and_then(|reply| prompts::parse_event_triple(&reply.text))
        .unwrap_or_else(|_| (agent.name.clone(), "is".to_string(), action.clone()));

        let poignancy_prompt = prompts::render_template(
            prompts::POIGNANCY,
            &[
                ("agent_name", agent.name.as_str()),
                ("persona", agent.persona.as_str()),
                ("kind", "event"),
                ("description", description.as_str()),
            ],
        );
        let poignancy = generate_with_timeout(
            oracle,
            OracleRequest::json(poignancy_prompt, config.oracle.scoring_max_tokens, timeout),
        )
        .await
        .and_then(|reply| prompts::parse_poignancy(&reply.text))
        .unwrap_or(DEFAULT_EVENT_POIGNANCY);
        (subject, predicate, object, poignancy)
    };

    let mut draft = NodeDraft::event(subject, predicate, object, description.clone(), poignancy);
    if let Ok(embedding) = embedder.embed(&description) {
        draft = draft.with_embedding(embedding);
    }
    match agent.store.append(draft, now) {
        Ok(_) => 1,
        Err(err) => {
            warn!(agent = %agent.id, error = %err, "own-action append rejected");
            0
        }
    }
}

/// Build the event draft for a perceived third-party action.
fn percept_draft<E: EmbeddingProvider>(percept: &Percept, embedder: &E) -> NodeDraft {
    let mut draft = NodeDraft::event(
        percept.subject.clone(),
        percept.predicate.clone(),
        percept.object.clone(),
        percept.description.clone(),
        PERCEPT_POIGNANCY,
    );
    if let Ok(embedding) = embedder.embed(&percept.description) {
        draft = draft.with_embedding(embedding);
    }
    draft
}
