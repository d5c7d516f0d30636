//! Vector embedding abstraction layer.
//!
//! Trait-based interface for generating the text embeddings that drive
//! relevance scoring. Production providers live in `hamlet-oracle`; this
//! module ships deterministic in-process providers for tests and for runs
//! without an embedding service, plus an LRU caching wrapper so any given
//! text is embedded at most once.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Result;
use crate::types::Embedding;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Generate vector embeddings from text.
///
/// Implementations must be `Send + Sync` so the scheduler can share them.
///
/// Callers treat any error as [`crate::EngineError::EmbeddingUnavailable`]
/// and degrade to neutral relevance rather than failing the operation.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into `dimensions()` floats.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::EmbeddingUnavailable`] when the
    /// provider cannot produce an embedding.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A human-readable name for the model backing this provider.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Stub provider (zero vectors)
// ---------------------------------------------------------------------------

/// A stub provider that returns zero-vectors.
///
/// Useful for unit tests that don't care about relevance, and as the
/// degraded mode when no embedding service is configured.
pub struct StubEmbeddingProvider {
    dims: usize,
}

impl StubEmbeddingProvider {
    /// Create a new stub provider with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingProvider for StubEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(Embedding(vec![0.0; self.dims]))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "stub-zero-vector"
    }
}

// ---------------------------------------------------------------------------
// Hashed provider (deterministic pseudo-embeddings)
// ---------------------------------------------------------------------------

/// Deterministic provider that derives a unit vector from the text's hash.
///
/// Identical texts embed identically and distinct texts land far apart,
/// which gives integration tests meaningful relevance structure without a
/// model and without breaking replay determinism.
pub struct HashedEmbeddingProvider {
    dims: usize,
}

impl HashedEmbeddingProvider {
    /// Create a new hashed provider.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;

        // SplitMix-style sequence seeded by the text hash.
        let raw: Vec<f32> = (0..self.dims)
            .map(|_| {
                state = state.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(0xBF58_476D_1CE4_E5B9);
                let bits = (state >> 40) as u32;
                (bits as f32 / (1u32 << 24) as f32) * 2.0 - 1.0
            })
            .collect();

        let mag: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag < f32::EPSILON {
            return Ok(Embedding(vec![0.0; self.dims]));
        }
        Ok(Embedding(raw.iter().map(|x| x / mag).collect()))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hashed-unit-vector"
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// LRU caching wrapper around any provider.
///
/// Embeddings are computed once per distinct text and reused; node
/// creation and focal-term queries frequently repeat the same strings.
pub struct CachedEmbedder<P> {
    inner: P,
    cache: Mutex<LruCache<String, Embedding>>,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    /// Wrap `inner` with a cache of `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(inner: P, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if let Some(hit) = self.cache.lock().get(text) {
            return Ok(hit.clone());
        }
        let embedding = self.inner.embed(text)?;
        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_provider_returns_zeros() {
        let provider = StubEmbeddingProvider::new(4);
        let emb = provider.embed("hello").expect("embed");
        assert_eq!(emb.0.len(), 4);
        assert!(emb.0.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn hashed_provider_is_deterministic_and_unit_length() {
        let provider = HashedEmbeddingProvider::new(64);
        let a = provider.embed("the town square").expect("embed");
        let b = provider.embed("the town square").expect("embed");
        let c = provider.embed("an entirely different place").expect("embed");

        assert_eq!(a, b, "same text must embed identically");
        let mag: f32 = a.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 0.01, "expected unit vector, got magnitude {mag}");
        assert!(a.cosine_similarity(&c) < 0.99, "distinct texts should not be collinear");
    }

    #[test]
    fn cache_embeds_each_text_once() {
        struct Counting {
            inner: HashedEmbeddingProvider,
            calls: std::sync::atomic::AtomicUsize,
        }
        impl EmbeddingProvider for Counting {
            fn embed(&self, text: &str) -> Result<Embedding> {
                self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                self.inner.embed(text)
            }
            fn dimensions(&self) -> usize {
                self.inner.dimensions()
            }
            fn model_name(&self) -> &str {
                "counting"
            }
        }

        let counting = Counting {
            inner: HashedEmbeddingProvider::new(8),
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let cached = CachedEmbedder::new(counting, 16);

        let first = cached.embed("repeated text").expect("embed");
        let second = cached.embed("repeated text").expect("embed");
        assert_eq!(first, second);
        assert_eq!(cached.cached_len(), 1);
        assert_eq!(cached.inner.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
