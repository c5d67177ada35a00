use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use flowstack_core::config::EmbeddingConfig;
use flowstack_core::error::{FlowstackError, Result};

/// Produces fixed-width vectors for chunks and queries.
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a batch of texts into vectors, one per input, in input order.
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;

    /// Width of the vectors this provider produces.
    fn dimensions(&self) -> usize;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint (works against
/// Ollama and similar local servers).
pub struct HttpEmbeddingProvider {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(async move {
            let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

            let mut req = self.http.post(&url).json(&EmbeddingRequest {
                model: &self.config.model,
                input: &texts,
            });
            if let Some(ref key) = self.config.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| FlowstackError::Embedding(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(FlowstackError::Embedding(format!("{status}: {body}")));
            }

            let body: EmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| FlowstackError::Embedding(e.to_string()))?;

            Ok(body.data.into_iter().map(|r| r.embedding).collect())
        })
    }

    fn dimensions(&self) -> usize {
        self.config.dims
    }
}

/// Cosine similarity of two vectors; 0.0 on mismatched or empty input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
