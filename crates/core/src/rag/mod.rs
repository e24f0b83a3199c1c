pub mod embedding;

use crate::rag::embedding::{cosine_similarity, Embedder, EmbeddingError};
use crate::storage::rag_documents::{self, NewDocument};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_N_RESULTS: usize = 5;

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Storage(String),

    #[error("documents and metadata must have equal length (got {documents} and {metadata})")]
    LengthMismatch { documents: usize, metadata: usize },

    #[error("collection name must be non-empty")]
    InvalidCollection,
}

impl RagError {
    fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}

/// How identifiers are assigned to an inserted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// `"0".."N-1"` by batch position; re-inserting overwrites earlier rows with the same index.
    #[default]
    Positional,
    /// SHA-256 of the document text; identical text refreshes, different text appends.
    ContentHash,
    /// Fresh UUID v4 per document; every insert appends.
    Unique,
}

impl IdStrategy {
    pub fn assign(&self, position: usize, document: &str) -> String {
        match self {
            Self::Positional => position.to_string(),
            Self::ContentHash => hex::encode(Sha256::digest(document.as_bytes())),
            Self::Unique => uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl FromStr for IdStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positional" => Ok(Self::Positional),
            "content" | "content_hash" => Ok(Self::ContentHash),
            "unique" | "uuid" => Ok(Self::Unique),
            other => anyhow::bail!("unknown RAG_ID_STRATEGY: {other} (expected positional, content or unique)"),
        }
    }
}

/// Handle over the vector store. Build it once at startup and share it.
#[derive(Clone)]
pub struct RagHelper {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    id_strategy: IdStrategy,
}

impl RagHelper {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, id_strategy: IdStrategy) -> Self {
        Self {
            pool,
            embedder,
            id_strategy,
        }
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<(), RagError> {
        if name.trim().is_empty() {
            return Err(RagError::InvalidCollection);
        }
        rag_documents::ensure_collection(&self.pool, name)
            .await
            .map_err(RagError::storage)
    }

    /// Embeds and stores `documents` with their parallel `metadata`. Returns the number of distinct ids written.
    pub async fn add_to_rag(
        &self,
        collection_name: &str,
        documents: &[String],
        metadata: &[Value],
    ) -> Result<usize, RagError> {
        if documents.len() != metadata.len() {
            return Err(RagError::LengthMismatch {
                documents: documents.len(),
                metadata: metadata.len(),
            });
        }

        self.get_or_create_collection(collection_name).await?;
        if documents.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.embed(documents).await?;
        if vectors.len() != documents.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: documents.len(),
                received: vectors.len(),
            }
            .into());
        }

        // One row per id; a later duplicate in the batch replaces the earlier one.
        let mut batch: Vec<NewDocument> = Vec::with_capacity(documents.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (i, ((document, metadata), embedding)) in
            documents.iter().zip(metadata).zip(vectors).enumerate()
        {
            let doc = NewDocument {
                id: self.id_strategy.assign(i, document),
                document: document.clone(),
                metadata: metadata.clone(),
                embedding,
            };
            match positions.get(&doc.id) {
                Some(&at) => batch[at] = doc,
                None => {
                    positions.insert(doc.id.clone(), batch.len());
                    batch.push(doc);
                }
            }
        }

        rag_documents::upsert_documents(
            &self.pool,
            collection_name,
            self.embedder.model_name(),
            &batch,
        )
        .await
        .map_err(RagError::storage)?;

        tracing::info!(
            collection = collection_name,
            inserted = batch.len(),
            id_strategy = ?self.id_strategy,
            "documents added to vector store"
        );
        Ok(batch.len())
    }

    /// Top `n_results` documents by cosine similarity to `query`, as one flat list.
    pub async fn query_from_rag(
        &self,
        collection_name: &str,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<String>, RagError> {
        self.get_or_create_collection(collection_name).await?;
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let rows = rag_documents::load_collection(&self.pool, collection_name)
            .await
            .map_err(RagError::storage)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.embedder.model_name();
        let total = rows.len();
        let rows: Vec<_> = rows.into_iter().filter(|r| r.model == model).collect();
        if rows.len() < total {
            tracing::warn!(
                collection = collection_name,
                skipped = total - rows.len(),
                model,
                "ignoring documents embedded with a different model"
            );
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch { sent: 1, received: 0 })?;

        let mut scored: Vec<(f32, String)> = rows
            .into_iter()
            .map(|r| (cosine_similarity(&query_vec, &r.embedding), r.document))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_results);

        Ok(scored.into_iter().map(|(_, doc)| doc).collect())
    }

    pub async fn collection_count(&self, collection_name: &str) -> Result<u64, RagError> {
        rag_documents::count_documents(&self.pool, collection_name)
            .await
            .map_err(RagError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embedding::HashingEmbedder;
    use crate::storage::connect_in_memory;
    use serde_json::json;

    async fn helper(strategy: IdStrategy) -> RagHelper {
        let pool = connect_in_memory().await.unwrap();
        RagHelper::new(pool, Arc::new(HashingEmbedder::default()), strategy)
    }

    fn batch(texts: &[&str]) -> (Vec<String>, Vec<Value>) {
        let docs = texts.iter().map(|t| t.to_string()).collect();
        let meta = texts.iter().map(|t| json!({ "title": t })).collect();
        (docs, meta)
    }

    #[tokio::test]
    async fn query_returns_exactly_k_flat_documents() {
        let rag = helper(IdStrategy::Positional).await;
        let (docs, meta) = batch(&[
            "Apple unveils new chip",
            "Tesla deliveries beat estimates",
            "Banks rally on rate outlook",
            "Oil slides on supply glut",
            "Retail sales cool in December",
            "Chipmakers lead tech gains",
            "Bond yields edge higher",
        ]);
        assert_eq!(rag.add_to_rag("news_collection", &docs, &meta).await.unwrap(), 7);

        let got = rag
            .query_from_rag("news_collection", "latest company news", 3)
            .await
            .unwrap();
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(|d| docs.contains(d)));
    }

    #[tokio::test]
    async fn query_caps_at_collection_size() {
        let rag = helper(IdStrategy::Positional).await;
        let (docs, meta) = batch(&["one", "two"]);
        rag.add_to_rag("c", &docs, &meta).await.unwrap();
        let got = rag.query_from_rag("c", "one", DEFAULT_N_RESULTS).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], "one");
    }

    #[tokio::test]
    async fn positional_reinsert_overwrites_instead_of_appending() {
        let rag = helper(IdStrategy::Positional).await;
        let (docs, meta) = batch(&["a1", "a2", "a3"]);
        rag.add_to_rag("trends_collection", &docs, &meta).await.unwrap();

        let (docs, meta) = batch(&["b1", "b2", "b3"]);
        rag.add_to_rag("trends_collection", &docs, &meta).await.unwrap();

        assert_eq!(rag.collection_count("trends_collection").await.unwrap(), 3);
        let got = rag.query_from_rag("trends_collection", "b1", 10).await.unwrap();
        assert!(got.iter().all(|d| d.starts_with('b')), "{got:?}");
    }

    #[tokio::test]
    async fn content_ids_dedupe_identical_text() {
        let rag = helper(IdStrategy::ContentHash).await;
        let (docs, meta) = batch(&["same", "other"]);
        rag.add_to_rag("c", &docs, &meta).await.unwrap();
        let (docs, meta) = batch(&["same", "new"]);
        rag.add_to_rag("c", &docs, &meta).await.unwrap();
        assert_eq!(rag.collection_count("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn content_ids_count_duplicates_within_a_batch_once() {
        let rag = helper(IdStrategy::ContentHash).await;
        let (docs, meta) = batch(&["same", "same", "other"]);
        assert_eq!(rag.add_to_rag("c", &docs, &meta).await.unwrap(), 2);
        assert_eq!(rag.collection_count("c").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unique_ids_append() {
        let rag = helper(IdStrategy::Unique).await;
        let (docs, meta) = batch(&["x", "y"]);
        rag.add_to_rag("c", &docs, &meta).await.unwrap();
        rag.add_to_rag("c", &docs, &meta).await.unwrap();
        assert_eq!(rag.collection_count("c").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn querying_an_absent_collection_is_empty() {
        let rag = helper(IdStrategy::Positional).await;
        let got = rag.query_from_rag("never_written", "anything", 5).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let rag = helper(IdStrategy::Positional).await;
        let (docs, meta) = batch(&["news item"]);
        rag.add_to_rag("news_collection", &docs, &meta).await.unwrap();
        assert!(rag
            .query_from_rag("trends_collection", "news item", 5)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn mismatched_metadata_is_rejected() {
        let rag = helper(IdStrategy::Positional).await;
        let err = rag
            .add_to_rag("c", &["a".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::LengthMismatch { documents: 1, metadata: 0 }));
    }

    #[test]
    fn id_strategy_parses_config_values() {
        assert_eq!("positional".parse::<IdStrategy>().unwrap(), IdStrategy::Positional);
        assert_eq!("Content".parse::<IdStrategy>().unwrap(), IdStrategy::ContentHash);
        assert_eq!("uuid".parse::<IdStrategy>().unwrap(), IdStrategy::Unique);
        assert!("append".parse::<IdStrategy>().is_err());
    }
}
