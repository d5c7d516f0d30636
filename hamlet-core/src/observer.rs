//! Per-tick summaries for external frontends.
//!
//! The scheduler emits one [`TickSummary`] per tick to every registered
//! observer. Transport and rendering are external concerns; this module
//! only defines the data and two in-process sinks.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{AgentId, Tick, TilePos};

/// What one agent did during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTickReport {
    /// Which agent.
    pub agent: AgentId,
    /// Display name, so frontends need no roster lookup.
    pub name: String,
    /// The action in progress at end of tick.
    pub action: String,
    /// Tile at end of tick.
    pub tile: TilePos,
    /// Memory nodes written this tick.
    pub memories_written: u32,
    /// Whether a reflection cycle fired.
    pub reflected: bool,
    /// Whether the deterministic fallback replaced an oracle decision.
    pub fallback_used: bool,
}

/// Everything that happened in one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// The completed tick.
    pub tick: Tick,
    /// Per-agent reports in processing order.
    pub reports: Vec<AgentTickReport>,
}

/// A sink for tick summaries.
pub trait Observer: Send + Sync {
    /// Called once per completed tick.
    fn on_tick(&self, summary: &TickSummary);
}

/// Logs each tick through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_tick(&self, summary: &TickSummary) {
        for report in &summary.reports {
            info!(
                tick = summary.tick.0,
                agent = %report.agent,
                name = %report.name,
                action = %report.action,
                tile = %report.tile,
                memories = report.memories_written,
                reflected = report.reflected,
                fallback = report.fallback_used,
                "tick report"
            );
        }
    }
}

/// Forwards tick summaries into an unbounded channel, for a frontend or
/// replay recorder running on its own task.
#[derive(Debug)]
pub struct ChannelObserver {
    sender: tokio::sync::mpsc::UnboundedSender<TickSummary>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end.
    #[must_use]
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<TickSummary>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Observer for ChannelObserver {
    fn on_tick(&self, summary: &TickSummary) {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.sender.send(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_forwards_summaries() {
        let (observer, mut receiver) = ChannelObserver::new();
        let summary = TickSummary {
            tick: Tick(3),
            reports: vec![AgentTickReport {
                agent: AgentId(0),
                name: "Ana".into(),
                action: "painting".into(),
                tile: TilePos::new(1, 1),
                memories_written: 2,
                reflected: false,
                fallback_used: true,
            }],
        };
        observer.on_tick(&summary);
        let received = receiver.try_recv().expect("summary");
        assert_eq!(received.tick, Tick(3));
        assert_eq!(received.reports.len(), 1);
        assert!(received.reports[0].fallback_used);
    }
}
