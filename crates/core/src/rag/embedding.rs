//! Text embedding backends and vector helpers.
//!
//! [`OpenAiEmbedder`] calls an OpenAI-compatible `/v1/embeddings` endpoint.
//! [`HashingEmbedder`] is a local, deterministic bag-of-words embedder that
//! needs no network access; vectors from the two are not comparable, so the
//! store records which model produced each row.

use crate::config::{request_error_text, Settings};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_HASHING_DIMS: usize = 256;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Network(String),

    #[error("embedding API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode embedding response: {0}")]
    Parse(String),

    #[error("embedding count mismatch: sent {sent}, received {received}")]
    CountMismatch { sent: usize, received: usize },
}

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier stored next to each vector (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Selects the backend named by `EMBEDDING_PROVIDER` (`openai` unless set to `local`).
pub fn embedder_from_settings(
    settings: &Settings,
    http: reqwest::Client,
) -> anyhow::Result<std::sync::Arc<dyn Embedder>> {
    match settings.embedding_provider.as_deref().unwrap_or("openai") {
        "openai" => Ok(std::sync::Arc::new(OpenAiEmbedder::from_settings(settings, http)?)),
        "local" => Ok(std::sync::Arc::new(HashingEmbedder::default())),
        other => anyhow::bail!("unknown EMBEDDING_PROVIDER: {other} (expected openai or local)"),
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_settings(settings: &Settings, http: reqwest::Client) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?;
        let base_url = settings
            .openai_base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL);
        let model = settings
            .embedding_model
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_MODEL);
        Ok(Self::new(http, base_url, api_key, model))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(request_error_text(e)))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| EmbeddingError::Network(request_error_text(e)))?;
        if !status.is_success() {
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let mut parsed = serde_json::from_str::<EmbeddingResponse>(&text)
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: texts.len(),
                received: parsed.data.len(),
            });
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Feature-hashing embedder: each lowercase alphanumeric token adds ±1 to one bucket.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            model: format!("local-hashing-{dims}"),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            out[bucket] += sign;
        }

        let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut out {
                *x /= norm;
            }
        }
        out
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMS)
    }
}

#[async_trait::async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Little-endian f32 bytes, 4 per component.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Returns 0.0 for empty or mismatched vectors.
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
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn blob_roundtrip_preserves_values() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hashing_embedder_is_deterministic_and_normalised() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_one("Apple shares rally on earnings");
        let b = e.embed_one("apple SHARES rally on earnings!");
        assert_eq!(a, b);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(e.model_name(), "local-hashing-64");
    }

    #[test]
    fn hashing_embedder_ranks_overlapping_text_higher() {
        let e = HashingEmbedder::default();
        let query = e.embed_one("latest company news");
        let close = e.embed_one("company news: chipmaker posts record quarter");
        let far = e.embed_one("XYZ - $1.20 (35%)");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn blank_text_embeds_to_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert_eq!(e.embed_one("  "), vec![0.0; 8]);
    }

    #[tokio::test]
    async fn openai_embedder_orders_by_index_and_sends_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "text-embedding-3-small",
                "input": ["a", "b"]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let e = OpenAiEmbedder::new(
            reqwest::Client::new(),
            server.url(),
            "sk-test",
            DEFAULT_OPENAI_MODEL,
        );
        let out = e.embed(&["a".to_string(), "b".to_string()]).await.unwrap();
        mock.assert_async().await;
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn openai_embedder_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(401)
            .with_body("{\"error\":\"bad key\"}")
            .create_async()
            .await;

        let e = OpenAiEmbedder::new(reqwest::Client::new(), server.url(), "bad", "m");
        let err = e.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn openai_transport_failure_does_not_leak_the_api_key() {
        let e = OpenAiEmbedder::new(reqwest::Client::new(), "http://127.0.0.1:1", "sk-SUPERSECRET", "m");
        let err = e.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Network(_)));
        assert!(!err.to_string().contains("sk-SUPERSECRET"), "{err}");
    }
}
