//! The reasoning-oracle capability consumed by the engine.
//!
//! The engine builds prompts from retrieved memories and working state,
//! hands them to an injected [`ReasoningOracle`], and parses the reply
//! into the few typed fields it needs. It never assumes model identity,
//! latency, or cost — those are provider concerns (see `hamlet-oracle`
//! for the HTTP implementations).

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the oracle is asked to shape its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Unconstrained natural language.
    FreeText,
    /// A single JSON value matching the prompt's stated schema.
    Json,
}

/// A request to the reasoning oracle.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Requested reply shape.
    pub shape: ResponseShape,
    /// Token budget for the reply.
    pub max_tokens: u32,
    /// Hard wall-clock bound for the call.
    pub timeout: Duration,
}

impl OracleRequest {
    /// Build a JSON-shaped request.
    #[must_use]
    pub fn json(prompt: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            shape: ResponseShape::Json,
            max_tokens,
            timeout,
        }
    }

    /// Build a free-text request.
    #[must_use]
    pub fn free_text(prompt: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            shape: ResponseShape::FreeText,
            max_tokens,
            timeout,
        }
    }
}

/// A reply from the reasoning oracle.
#[derive(Debug, Clone)]
pub struct OracleReply {
    /// The generated text.
    pub text: String,
    /// Tokens generated, when the provider reports it.
    pub tokens_generated: u32,
    /// Provider-observed latency in milliseconds.
    pub latency_ms: u64,
    /// Which model produced the reply, when known.
    pub model: String,
}

impl OracleReply {
    /// A reply carrying only text (test providers).
    #[must_use]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_generated: 0,
            latency_ms: 0,
            model: String::new(),
        }
    }
}

/// Why an oracle call failed. Every variant is recoverable: the caller
/// falls back to a deterministic default action and the tick continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleFailure {
    /// The call exceeded its wall-clock bound.
    #[error("oracle call timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the call was abandoned.
        elapsed_ms: u64,
    },

    /// The provider refused the call for rate reasons.
    #[error("oracle rate limited")]
    RateLimited,

    /// The reply could not be parsed into the expected shape.
    #[error("oracle output malformed: {0}")]
    MalformedOutput(String),

    /// No provider is reachable at all.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for oracle calls.
pub type OracleResult = std::result::Result<OracleReply, OracleFailure>;

/// The reasoning capability injected into the scheduler per run.
///
/// The single suspension point of the agent cycle: `generate` may take
/// externally-bounded wall-clock time and is always awaited under a
/// timeout, holding no engine locks.
pub trait ReasoningOracle: Send + Sync {
    /// Generate text for a prompt.
    fn generate(
        &self,
        request: OracleRequest,
    ) -> impl std::future::Future<Output = OracleResult> + Send;
}

/// Await an oracle call under its own declared timeout.
///
/// The elapsed deadline maps to [`OracleFailure::Timeout`]; the dropped
/// future abandons the provider call. Callers hold no engine locks across
/// this await.
pub async fn generate_with_timeout<O: ReasoningOracle>(
    oracle: &O,
    request: OracleRequest,
) -> OracleResult {
    let deadline = request.timeout;
    match tokio::time::timeout(deadline, oracle.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(OracleFailure::Timeout {
            elapsed_ms: deadline.as_millis() as u64,
        }),
    }
}

// ---------------------------------------------------------------------------
// Test / degraded-mode providers
// ---------------------------------------------------------------------------

/// An oracle with no backend: every call fails `Unavailable`, driving the
/// deterministic fallback path everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl ReasoningOracle for OfflineOracle {
    async fn generate(&self, _request: OracleRequest) -> OracleResult {
        Err(OracleFailure::Unavailable("no oracle configured".into()))
    }
}

/// A scripted oracle for tests: replies are popped in order; once the
/// script runs dry every further call fails `Unavailable`.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<OracleResult>>,
}

impl ScriptedOracle {
    /// Build a scripted oracle from a reply sequence.
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = OracleResult>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Script a sequence of successful text replies.
    #[must_use]
    pub fn replying(texts: impl IntoIterator<Item = &'static str>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(OracleReply::text_only(t))))
    }

    /// Append a reply to the script.
    pub fn push(&self, reply: OracleResult) {
        self.script.lock().push_back(reply);
    }

    /// Replies left in the script.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl ReasoningOracle for ScriptedOracle {
    async fn generate(&self, _request: OracleRequest) -> OracleResult {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(OracleFailure::Unavailable("script exhausted".into())))
    }
}
