//! HTTP oracle client — unified interface over Ollama and
//! OpenAI-compatible backends.

use std::time::Instant;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use hamlet_core::oracle::{
    OracleReply, OracleRequest, OracleResult, ReasoningOracle, ResponseShape,
};

use crate::error::OracleError;

/// Provider backend for text generation.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Ollama running locally (recommended for development).
    Ollama {
        /// Base URL, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// OpenAI-compatible API (also covers Anthropic-compatible gateways,
    /// Together, vLLM, etc.).
    OpenAiCompatible {
        /// Base URL up to (not including) `/v1`.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No backend — every call fails, driving the engine's deterministic
    /// fallback path.
    None,
}

/// The HTTP-backed reasoning oracle injected into the scheduler.
pub struct HttpOracle {
    provider: Provider,
    http: Client,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl HttpOracle {
    /// Create a new HTTP oracle.
    #[must_use]
    pub fn new(provider: Provider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            temperature: 0.7,
            max_retries,
        }
    }

    /// Create an oracle with no backend (all calls fail → fallback).
    #[must_use]
    pub fn none() -> Self {
        Self::new(Provider::None, "", 0)
    }

    /// Override the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, Provider::None)
    }

    async fn generate_inner(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        match &self.provider {
            Provider::None => Err(OracleError::Unavailable("no oracle provider configured".into())),
            Provider::Ollama { base_url } => self.generate_ollama(base_url, request).await,
            Provider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
        }
    }

    /// Generate using Ollama's `/api/generate`.
    async fn generate_ollama(
        &self,
        base_url: &str,
        request: &OracleRequest,
    ) -> Result<OracleReply, OracleError> {
        let url = format!("{base_url}/api/generate");
        let mut body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": request.max_tokens,
            }
        });
        if request.shape == ResponseShape::Json {
            body["format"] = json!("json");
        }

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt, max = self.max_retries + 1, "retrying Ollama call");
            }
            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .json(&body)
                .timeout(request.timeout)
                .send()
                .await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: serde_json::Value =
                        resp.json().await.map_err(|e| OracleError::Parse(e.to_string()))?;
                    return Ok(extract_ollama_reply(&json, &self.model, latency_ms));
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    return Err(OracleError::RateLimited);
                }
                Ok(resp) => {
                    last_error = format!(
                        "HTTP {}: {}",
                        resp.status(),
                        resp.text().await.unwrap_or_default()
                    );
                    warn!(error = %last_error, "Ollama returned error");
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(OracleError::Timeout(request.timeout.as_millis() as u64));
                    }
                    last_error = e.to_string();
                    warn!(error = %last_error, "Ollama request failed");
                }
            }
        }

        Err(OracleError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Generate using an OpenAI-compatible `/v1/chat/completions`.
    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &OracleRequest,
    ) -> Result<OracleReply, OracleError> {
        let url = format!("{base_url}/v1/chat/completions");
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": self.temperature,
        });
        if request.shape == ResponseShape::Json {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt, max = self.max_retries + 1, "retrying chat completion call");
            }
            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&body)
                .timeout(request.timeout)
                .send()
                .await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: serde_json::Value =
                        resp.json().await.map_err(|e| OracleError::Parse(e.to_string()))?;
                    return Ok(extract_openai_reply(&json, &self.model, latency_ms));
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    return Err(OracleError::RateLimited);
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                    warn!(error = %last_error, "chat completion API returned error");
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(OracleError::Timeout(request.timeout.as_millis() as u64));
                    }
                    last_error = e.to_string();
                    warn!(error = %last_error, "chat completion request failed");
                }
            }
        }

        Err(OracleError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

impl ReasoningOracle for HttpOracle {
    async fn generate(&self, request: OracleRequest) -> OracleResult {
        self.generate_inner(&request).await.map_err(Into::into)
    }
}

/// Pull the reply text and token count out of an Ollama response body.
fn extract_ollama_reply(json: &serde_json::Value, model: &str, latency_ms: u64) -> OracleReply {
    OracleReply {
        text: json["response"].as_str().unwrap_or("").to_string(),
        tokens_generated: json["eval_count"].as_u64().unwrap_or(0) as u32,
        latency_ms,
        model: model.to_string(),
    }
}

/// Pull the reply text and token count out of an OpenAI-compatible
/// response body.
fn extract_openai_reply(json: &serde_json::Value, model: &str, latency_ms: u64) -> OracleReply {
    OracleReply {
        text: json["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string(),
        tokens_generated: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        latency_ms,
        model: model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn none_provider_maps_to_unavailable() {
        let oracle = HttpOracle::none();
        assert!(!oracle.is_available());
        let request = OracleRequest::free_text("hello", 10, Duration::from_millis(100));
        let failure = oracle.generate(request).await.expect_err("must fail");
        assert!(matches!(failure, hamlet_core::oracle::OracleFailure::Unavailable(_)));
    }

    #[test]
    fn ollama_reply_extraction() {
        let body = json!({ "response": "hello there", "eval_count": 12 });
        let reply = extract_ollama_reply(&body, "qwen2.5:1.5b", 80);
        assert_eq!(reply.text, "hello there");
        assert_eq!(reply.tokens_generated, 12);
        assert_eq!(reply.model, "qwen2.5:1.5b");
    }

    #[test]
    fn openai_reply_extraction() {
        let body = json!({
            "choices": [{ "message": { "content": "{\"action\": \"idle\"}" } }],
            "usage": { "completion_tokens": 9 }
        });
        let reply = extract_openai_reply(&body, "gpt-4o-mini", 120);
        assert_eq!(reply.text, "{\"action\": \"idle\"}");
        assert_eq!(reply.tokens_generated, 9);
    }

    #[test]
    fn missing_fields_extract_to_empty_defaults() {
        let reply = extract_ollama_reply(&json!({}), "m", 1);
        assert!(reply.text.is_empty());
        assert_eq!(reply.tokens_generated, 0);
    }
}
