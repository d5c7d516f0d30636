//! HTTP embedding providers.
//!
//! [`EmbeddingClient`] speaks the Ollama and OpenAI-compatible embedding
//! APIs asynchronously; [`RemoteEmbedder`] adapts it to the engine's
//! synchronous [`EmbeddingProvider`] trait for use inside the scheduler.

use serde_json::json;
use tracing::debug;

use hamlet_core::embedding::EmbeddingProvider;
use hamlet_core::types::Embedding;
use hamlet_core::EngineError;

use crate::client::Provider;
use crate::error::OracleError;

/// Async client for remote embedding APIs.
pub struct EmbeddingClient {
    provider: Provider,
    http: reqwest::Client,
    model: String,
    dimensions: usize,
    timeout: std::time::Duration,
}

impl EmbeddingClient {
    /// Create a client for `model` producing `dimensions`-float vectors.
    #[must_use]
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        dimensions: usize,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
            model: model.into(),
            dimensions,
            timeout,
        }
    }

    /// The configured dimensionality.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] on transport failure, undecodable bodies,
    /// or a vector of unexpected dimensionality.
    pub async fn embed(&self, text: &str) -> Result<Embedding, OracleError> {
        let embedding = match &self.provider {
            Provider::None => {
                return Err(OracleError::Unavailable("no embedding provider configured".into()));
            }
            Provider::Ollama { base_url } => {
                let url = format!("{base_url}/api/embeddings");
                let body = json!({ "model": self.model, "prompt": text });
                let resp = self
                    .http
                    .post(&url)
                    .json(&body)
                    .timeout(self.timeout)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| OracleError::RequestFailed(e.to_string()))?;
                let json: serde_json::Value =
                    resp.json().await.map_err(|e| OracleError::Parse(e.to_string()))?;
                parse_ollama_embedding(&json)?
            }
            Provider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/embeddings");
                let body = json!({ "model": self.model, "input": text });
                let resp = self
                    .http
                    .post(&url)
                    .header("Authorization", format!("Bearer {api_key}"))
                    .json(&body)
                    .timeout(self.timeout)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| OracleError::RequestFailed(e.to_string()))?;
                let json: serde_json::Value =
                    resp.json().await.map_err(|e| OracleError::Parse(e.to_string()))?;
                parse_openai_embedding(&json)?
            }
        };

        if embedding.dimensions() != self.dimensions {
            return Err(OracleError::Parse(format!(
                "provider returned {} dimensions, expected {}",
                embedding.dimensions(),
                self.dimensions
            )));
        }
        debug!(chars = text.len(), dims = embedding.dimensions(), "embedded text");
        Ok(embedding)
    }
}

/// Decode an Ollama `/api/embeddings` response body.
fn parse_ollama_embedding(json: &serde_json::Value) -> Result<Embedding, OracleError> {
    let values = json["embedding"]
        .as_array()
        .ok_or_else(|| OracleError::Parse("missing 'embedding' array".into()))?;
    collect_floats(values)
}

/// Decode an OpenAI-compatible `/v1/embeddings` response body.
fn parse_openai_embedding(json: &serde_json::Value) -> Result<Embedding, OracleError> {
    let values = json["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| OracleError::Parse("missing 'data[0].embedding' array".into()))?;
    collect_floats(values)
}

fn collect_floats(values: &[serde_json::Value]) -> Result<Embedding, OracleError> {
    let floats: Option<Vec<f32>> = values.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
    floats
        .map(Embedding)
        .ok_or_else(|| OracleError::Parse("non-numeric embedding element".into()))
}

// ---------------------------------------------------------------------------
// Sync adapter
// ---------------------------------------------------------------------------

/// Adapts [`EmbeddingClient`] to the engine's synchronous
/// [`EmbeddingProvider`] trait.
///
/// Blocks the calling worker thread on the async request via
/// `block_in_place`, so it requires the multi-thread tokio runtime (the
/// default). Wrap it in `hamlet_core::embedding::CachedEmbedder` so each
/// distinct text goes over the wire once.
pub struct RemoteEmbedder {
    client: EmbeddingClient,
    handle: tokio::runtime::Handle,
}

impl RemoteEmbedder {
    /// Create an adapter using the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] when called outside a tokio
    /// runtime.
    pub fn new(client: EmbeddingClient) -> Result<Self, OracleError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| OracleError::Config(format!("no tokio runtime: {e}")))?;
        Ok(Self { client, handle })
    }
}

impl EmbeddingProvider for RemoteEmbedder {
    fn embed(&self, text: &str) -> hamlet_core::Result<Embedding> {
        tokio::task::block_in_place(|| self.handle.block_on(self.client.embed(text)))
            .map_err(|e| EngineError::EmbeddingUnavailable(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.client.dimensions()
    }

    fn model_name(&self) -> &str {
        self.client.model()
    }
}
