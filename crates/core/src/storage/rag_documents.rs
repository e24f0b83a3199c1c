use crate::rag::embedding::{blob_to_vec, vec_to_blob};
use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
    pub model: String,
}

pub async fn ensure_collection(pool: &SqlitePool, name: &str) -> anyhow::Result<()> {
    sqlx::query("INSERT OR IGNORE INTO rag_collections (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await
        .with_context(|| format!("failed to create collection {name}"))?;
    Ok(())
}

/// Writes the batch in one transaction; an existing `(collection, id)` row is overwritten.
pub async fn upsert_documents(
    pool: &SqlitePool,
    collection: &str,
    model: &str,
    docs: &[NewDocument],
) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let now = Utc::now();
    let mut affected: u64 = 0;

    for doc in docs {
        let metadata = serde_json::to_string(&doc.metadata).context("metadata serialize failed")?;
        let res = sqlx::query(
            "INSERT INTO rag_documents (collection, id, document, metadata, embedding, model, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (collection, id) DO UPDATE \
               SET document = excluded.document, metadata = excluded.metadata, \
                   embedding = excluded.embedding, model = excluded.model, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(&doc.id)
        .bind(&doc.document)
        .bind(metadata)
        .bind(vec_to_blob(&doc.embedding))
        .bind(model)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert into {collection} failed (id={})", doc.id))?;
        affected += res.rows_affected();
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

pub async fn load_collection(pool: &SqlitePool, collection: &str) -> anyhow::Result<Vec<StoredDocument>> {
    let rows = sqlx::query_as::<_, (String, String, String, Vec<u8>, String)>(
        "SELECT id, document, metadata, embedding, model \
         FROM rag_documents \
         WHERE collection = ? \
         ORDER BY id ASC",
    )
    .bind(collection)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to load collection {collection}"))?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, document, metadata, embedding, model) in rows {
        let metadata = serde_json::from_str::<Value>(&metadata)
            .with_context(|| format!("invalid metadata JSON in {collection} (id={id})"))?;
        out.push(StoredDocument {
            id,
            document,
            metadata,
            embedding: blob_to_vec(&embedding),
            model,
        });
    }
    Ok(out)
}

pub async fn count_documents(pool: &SqlitePool, collection: &str) -> anyhow::Result<u64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rag_documents WHERE collection = ?")
        .bind(collection)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to count collection {collection}"))?;
    Ok(count.max(0) as u64)
}
