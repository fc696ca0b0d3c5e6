//! Embedding provider implementations.
//!
//! Three backends behind the core [`Embedder`] trait:
//! - **[`DisabledEmbedder`]** — fails every call; used when embeddings
//!   are not configured. Duplicate checks cannot run without vectors, so
//!   creation fails loudly instead of proceeding unchecked.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API with
//!   retry, exponential backoff, and a configurable request timeout.
//! - **[`HashEmbedder`]** — deterministic local feature-hashing vectors.
//!   No network, stable across runs; used by tests and offline
//!   deployments where token overlap is an acceptable stand-in for
//!   semantics.
//!
//! # Retry Strategy (OpenAI)
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use askboard_core::embedding::Embedder;
use askboard_core::error::QaError;
use askboard_core::normalize::tokenize;

use crate::config::EmbeddingConfig;

/// Create the appropriate [`Embedder`] based on configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedder::new(config)?)),
        other => Err(anyhow!("Unknown embedding provider: {}", other)),
    }
}

fn require_non_empty(text: &str) -> Result<(), QaError> {
    if text.trim().is_empty() {
        return Err(QaError::Validation(
            "cannot embed empty text".to_string(),
        ));
    }
    Ok(())
}

// ============ Disabled ============

/// Provider used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, QaError> {
        Err(QaError::upstream(anyhow!(
            "embedding provider is disabled; set [embedding] provider in config"
        )))
    }
}

// ============ OpenAI ============

/// Embedding provider using the OpenAI `POST /v1/embeddings` endpoint.
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for the openai provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for the openai provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            anyhow::bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_openai_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError> {
        require_non_empty(text)?;
        let vector = self.request(text).await.map_err(QaError::Upstream)?;
        if vector.len() != self.dims {
            return Err(QaError::upstream(anyhow!(
                "provider returned {} dims, configured {}",
                vector.len(),
                self.dims
            )));
        }
        Ok(vector)
    }
}

/// Parse the OpenAI embeddings API response JSON.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let embedding = data
        .first()
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Hash ============

/// Deterministic feature-hashing embedder.
///
/// Each token hashes (SHA-256) to a dimension index and a sign; token
/// counts accumulate and the result is L2-normalized. Texts sharing
/// tokens land close in the vector space, so cosine similarity tracks
/// token overlap.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for the hash provider"))?;
        if dims == 0 {
            anyhow::bail!("embedding.dims must be > 0 for the hash provider");
        }
        Ok(Self { dims })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[0..8].try_into().unwrap()) as usize % self.dims;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "feature-hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError> {
        require_non_empty(text)?;
        Ok(self.vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askboard_core::embedding::cosine_similarity;

    fn hash_embedder(dims: usize) -> HashEmbedder {
        HashEmbedder::new(&EmbeddingConfig {
            provider: "hash".to_string(),
            model: None,
            dims: Some(dims),
            max_retries: 0,
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic_and_normalized() {
        let embedder = hash_embedder(256);
        let a = embedder.embed("how do rust lifetimes work").await.unwrap();
        let b = embedder.embed("how do rust lifetimes work").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_similarity_tracks_token_overlap() {
        let embedder = hash_embedder(256);
        let base = embedder.embed("install rust on linux").await.unwrap();
        let near = embedder.embed("install rust on macos").await.unwrap();
        let far = embedder.embed("pytorch gradient descent tutorial").await.unwrap();
        let sim_near = cosine_similarity(&base, &near);
        let sim_far = cosine_similarity(&base, &far);
        assert!(sim_near > sim_far);
        assert!(sim_near > 0.5);
    }

    #[tokio::test]
    async fn test_hash_embedder_rejects_empty_input() {
        let embedder = hash_embedder(64);
        let err = embedder.embed("   ").await.unwrap_err();
        assert!(matches!(err, QaError::Validation(_)));
    }

    #[tokio::test]
    async fn test_disabled_embedder_fails_loudly() {
        let err = DisabledEmbedder.embed("anything").await.unwrap_err();
        assert!(matches!(err, QaError::Upstream(_)));
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "data": [ { "embedding": [0.25, -0.5, 1.0] } ]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), vec![0.25, -0.5, 1.0]);
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
    }
}
