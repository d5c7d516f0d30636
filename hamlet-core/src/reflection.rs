//! Reflection — synthesizing higher-level thoughts from recent memories.
//!
//! Tracks accumulated importance of unreflected nodes and, once the
//! threshold is crossed, runs an oracle-backed cycle: focal questions →
//! evidence retrieval → insights appended as Thought nodes whose
//! `filling` points at their evidence. If the oracle is unavailable the
//! cycle is skipped, not failed: the accumulator stays intact and the
//! check re-fires next tick.

use tracing::{debug, warn};

use crate::agent::Agent;
use crate::config::SimConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::NodeDraft;
use crate::oracle::{generate_with_timeout, OracleRequest, ReasoningOracle};
use crate::prompts;
use crate::retrieval::RetrievalEngine;
use crate::types::{NodeId, Tick};

/// Poignancy assigned to a synthesized thought when the scoring call
/// fails.
pub const DEFAULT_THOUGHT_POIGNANCY: f32 = 5.0;

/// What a reflection attempt did.
#[derive(Debug, Clone, Default)]
pub struct ReflectionOutcome {
    /// Whether a cycle ran and drained the accumulator.
    pub fired: bool,
    /// Thought nodes appended by the cycle.
    pub new_thoughts: Vec<NodeId>,
}

/// Check the trigger and run a reflection cycle if it is due.
///
/// The accumulator is drained only when at least one thought lands;
/// every oracle failure path leaves it intact for the next tick.
pub async fn maybe_reflect<O: ReasoningOracle>(
    agent: &mut Agent,
    retrieval: &RetrievalEngine,
    embedder: &dyn EmbeddingProvider,
    oracle: &O,
    config: &SimConfig,
    now: Tick,
) -> ReflectionOutcome {
    // The working-state mirror is the threshold source; the scheduler
    // refreshes it after every write-back.
    if agent.scratch.unreflected_importance < config.reflection.importance_threshold {
        return ReflectionOutcome::default();
    }

    let timeout = std::time::Duration::from_millis(config.oracle.request_timeout_ms);

    // Focal questions over everything accumulated since the last cycle.
    let statements: Vec<String> = agent
        .store
        .unreflected_nodes()
        .iter()
        .filter_map(|id| agent.store.node(*id))
        .map(|node| node.description.clone())
        .collect();
    let focal_prompt = prompts::render_template(
        prompts::FOCAL_POINTS,
        &[
            ("agent_name", agent.name.as_str()),
            ("statements", statements.join("\n").as_str()),
            ("count", config.reflection.focal_points.to_string().as_str()),
        ],
    );
    let focal_reply = generate_with_timeout(
        oracle,
        OracleRequest::json(focal_prompt, config.oracle.reflection_max_tokens, timeout),
    )
    .await
    .and_then(|reply| prompts::parse_focal_points(&reply.text));

    let focal_points = match focal_reply {
        Ok(points) => points,
        Err(failure) => {
            warn!(agent = %agent.id, error = %failure, "reflection skipped: no focal points");
            return ReflectionOutcome::default();
        }
    };

    let mut new_thoughts = Vec::new();
    for focal in focal_points.iter().take(config.reflection.focal_points) {
        let evidence = retrieval.retrieve(&mut agent.store, std::slice::from_ref(focal), embedder, now);
        if evidence.is_empty() {
            continue;
        }
        let evidence_ids: Vec<NodeId> = evidence.iter().map(|r| r.node_id).collect();
        let numbered: Vec<String> = evidence_ids
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                agent.store.node(*id).map(|node| format!("{}. {}", i + 1, node.description))
            })
            .collect();

        let insight_prompt = prompts::render_template(
            prompts::INSIGHTS,
            &[
                ("agent_name", agent.name.as_str()),
                ("statements", numbered.join("\n").as_str()),
                (
                    "count",
                    config.reflection.insights_per_focal_point.to_string().as_str(),
                ),
            ],
        );
        let insights = match generate_with_timeout(
            oracle,
            OracleRequest::json(insight_prompt, config.oracle.reflection_max_tokens, timeout),
        )
        .await
        .and_then(|reply| prompts::parse_insights(&reply.text))
        {
            Ok(insights) => insights,
            Err(failure) => {
                warn!(agent = %agent.id, focal = %focal, error = %failure, "insight synthesis failed");
                continue;
            }
        };

        for insight in insights.into_iter().take(config.reflection.insights_per_focal_point) {
            // 1-based evidence numbers map back into the numbered list.
            let filling: Vec<NodeId> = insight
                .evidence
                .iter()
                .filter_map(|&n| n.checked_sub(1).and_then(|i| evidence_ids.get(i)))
                .copied()
                .collect();

            let poignancy = score_thought(oracle, agent, &insight.text, config, timeout).await;
            let mut draft = NodeDraft::thought(insight.text.clone(), poignancy, filling);
            if let Ok(embedding) = embedder.embed(&insight.text) {
                draft = draft.with_embedding(embedding);
            }
            match agent.store.append(draft, now) {
                Ok(node) => new_thoughts.push(node.id),
                Err(err) => warn!(agent = %agent.id, error = %err, "thought append rejected"),
            }
        }
    }

    if new_thoughts.is_empty() {
        warn!(agent = %agent.id, "reflection produced no thoughts; accumulator left intact");
        return ReflectionOutcome::default();
    }

    let (drained, _) = agent.store.drain_unreflected();
    agent.scratch.unreflected_importance = agent.store.unreflected_importance();
    agent.scratch.last_reflection_tick = now;
    debug!(
        agent = %agent.id,
        drained,
        thoughts = new_thoughts.len(),
        "reflection cycle complete"
    );

    ReflectionOutcome {
        fired: true,
        new_thoughts,
    }
}

/// Score a synthesized thought's poignancy, falling back to the default
/// on any oracle failure.
async fn score_thought<O: ReasoningOracle>(
    oracle: &O,
    agent: &Agent,
    text: &str,
    config: &SimConfig,
    timeout: std::time::Duration,
) -> f32 {
    let prompt = prompts::render_template(
        prompts::POIGNANCY,
        &[
            ("agent_name", agent.name.as_str()),
            ("persona", agent.persona.as_str()),
            ("kind", "thought"),
            ("description", text),
        ],
    );
    generate_with_timeout(
        oracle,
        OracleRequest::json(prompt, config.oracle.scoring_max_tokens, timeout),
    )
    .await
    .and_then(|reply| prompts::parse_poignancy(&reply.text))
    .unwrap_or(DEFAULT_THOUGHT_POIGNANCY)
}
