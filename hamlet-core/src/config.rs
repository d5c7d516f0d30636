//! Configuration for the hamlet engine.
//!
//! One top-level [`SimConfig`] maps directly to `hamlet.toml`; every field
//! has a default so partial files (or none at all) work.

use serde::{Deserialize, Serialize};

/// Top-level simulation configuration, loadable from TOML.
///
/// Passed explicitly into the scheduler at construction — there is no
/// ambient global configuration state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Retrieval algorithm settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Perception settings.
    #[serde(default)]
    pub perception: PerceptionConfig,
    /// Reflection trigger settings.
    #[serde(default)]
    pub reflection: ReflectionConfig,
    /// Reasoning-oracle call settings.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Movement and navigation settings.
    #[serde(default)]
    pub movement: MovementConfig,
    /// Persistence / snapshot settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl SimConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `EngineError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::EngineError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Memory retrieval algorithm settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of memories returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Recency half-life in ticks: a node last accessed this many ticks
    /// ago scores 0.5 on the recency component.
    #[serde(default = "default_half_life")]
    pub recency_half_life_ticks: f64,
    /// When true, candidates are restricted to keyword-index matches of
    /// the focal terms (cheap path, may miss paraphrases). When false the
    /// whole store is scored.
    #[serde(default)]
    pub keyword_fast_path: bool,
    /// Blend weight tuning.
    #[serde(default)]
    pub weights: RetrievalWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            recency_half_life_ticks: 24.0,
            keyword_fast_path: false,
            weights: RetrievalWeights::default(),
        }
    }
}

/// Retrieval scoring weights. Non-negative; relevance and importance
/// outweigh recency by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalWeights {
    /// Weight for the recency component.
    #[serde(default = "default_0_5")]
    pub recency: f64,
    /// Weight for the importance component.
    #[serde(default = "default_2_0")]
    pub importance: f64,
    /// Weight for the semantic-relevance component.
    #[serde(default = "default_3_0")]
    pub relevance: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            recency: 0.5,
            importance: 2.0,
            relevance: 3.0,
        }
    }
}

/// Distance metric for perception neighborhoods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Chessboard distance — a radius-1 neighborhood is the 8 surrounding
    /// tiles.
    Chebyshev,
    /// Taxicab distance — a radius-1 neighborhood is the 4 orthogonal
    /// tiles.
    Manhattan,
}

/// Perception settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    /// How far (in tiles) an agent can perceive.
    #[serde(default = "default_vision_radius")]
    pub vision_radius: u32,
    /// Which distance metric bounds the perception neighborhood.
    #[serde(default = "default_metric")]
    pub metric: DistanceMetric,
    /// Maximum number of events perceived per tick (nearest first).
    #[serde(default = "default_attention_bandwidth")]
    pub attention_bandwidth: usize,
    /// How many recent event nodes are checked when filtering out
    /// already-remembered percepts.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            vision_radius: 4,
            metric: DistanceMetric::Chebyshev,
            attention_bandwidth: 3,
            retention: 5,
        }
    }
}

/// Reflection trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Reflection fires once the summed poignancy of unreflected nodes
    /// reaches this threshold.
    #[serde(default = "default_reflection_threshold")]
    pub importance_threshold: f32,
    /// How many focal points the oracle is asked to produce per cycle.
    #[serde(default = "default_focal_points")]
    pub focal_points: usize,
    /// How many insights are requested per focal point.
    #[serde(default = "default_insights")]
    pub insights_per_focal_point: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            importance_threshold: 150.0,
            focal_points: 3,
            insights_per_focal_point: 5,
        }
    }
}

/// Reasoning-oracle call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Hard timeout for any single oracle call in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Token budget for decision calls.
    #[serde(default = "default_decision_tokens")]
    pub decision_max_tokens: u32,
    /// Token budget for reflection calls.
    #[serde(default = "default_reflection_tokens")]
    pub reflection_max_tokens: u32,
    /// Token budget for short scoring calls (poignancy, triples).
    #[serde(default = "default_scoring_tokens")]
    pub scoring_max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
            decision_max_tokens: 300,
            reflection_max_tokens: 500,
            scoring_max_tokens: 50,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding vector dimensions; appends with any other length are
    /// rejected as malformed.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Capacity of the text → embedding LRU cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            cache_capacity: 4096,
        }
    }
}

/// Movement and navigation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Allow a diagonal step even when both flanking orthogonal tiles are
    /// impassable. Off by default: agents may not cut corners.
    #[serde(default)]
    pub allow_corner_cutting: bool,
    /// Default duration (ticks) for an action whose decision omitted one.
    #[serde(default = "default_action_duration")]
    pub default_action_duration: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            allow_corner_cutting: false,
            default_action_duration: 10,
        }
    }
}

/// Persistence / snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect snapshot corruption via CRC-32 checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Number of rotating backups to keep.
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
    /// Snapshot automatically every N ticks (0 disables autosnapshot).
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_ticks: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            checksum_enabled: true,
            backup_count: 3,
            snapshot_interval_ticks: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_metric() -> DistanceMetric { DistanceMetric::Chebyshev }
fn default_0_5() -> f64 { 0.5 }
fn default_2_0() -> f64 { 2.0 }
fn default_3_0() -> f64 { 3.0 }
fn default_top_k() -> usize { 10 }
fn default_half_life() -> f64 { 24.0 }
fn default_vision_radius() -> u32 { 4 }
fn default_attention_bandwidth() -> usize { 3 }
fn default_retention() -> usize { 5 }
fn default_reflection_threshold() -> f32 { 150.0 }
fn default_focal_points() -> usize { 3 }
fn default_insights() -> usize { 5 }
fn default_timeout_ms() -> u64 { 5000 }
fn default_decision_tokens() -> u32 { 300 }
fn default_reflection_tokens() -> u32 { 500 }
fn default_scoring_tokens() -> u32 { 50 }
fn default_dimensions() -> usize { 384 }
fn default_cache_capacity() -> usize { 4096 }
fn default_action_duration() -> u32 { 10 }
fn default_backup_count() -> u32 { 3 }
fn default_snapshot_interval() -> u64 { 100 }
