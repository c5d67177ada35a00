use std::path::Path;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use rusqlite::{params, Connection};
use tracing::debug;

use flowstack_core::error::{FlowstackError, Result};
use flowstack_core::traits::KnowledgeBase;
use flowstack_core::types::{IngestStats, RetrievalHit};

use crate::chunk::{chunk_text, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::embeddings::{cosine_similarity, EmbeddingProvider};

/// Characters of the first chunk returned as the ingest preview.
const PREVIEW_LEN: usize = 500;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kb_chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        collection_id INTEGER NOT NULL,
        source TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        char_start INTEGER NOT NULL,
        char_end INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_kb_chunks_collection
        ON kb_chunks(collection_id);";

/// SQLite-backed knowledge base with in-process cosine ranking.
///
/// One table holds every collection; `collection_id` keys rows to their
/// stack. Vectors are stored as little-endian f32 blobs.
pub struct SqliteKnowledgeBase {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteKnowledgeBase {
    /// Open or create the database at the given path.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FlowstackError::Database(format!("Failed to create db directory: {e}")))?;
        }

        let conn =
            Connection::open(path).map_err(|e| FlowstackError::Database(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| FlowstackError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| FlowstackError::Database(e.to_string()))?;

        debug!(path = %path.display(), "Knowledge base opened");
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| FlowstackError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| FlowstackError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn unblob(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

impl KnowledgeBase for SqliteKnowledgeBase {
    fn ingest(
        &self,
        text: &str,
        collection_id: i64,
        source: &str,
    ) -> BoxFuture<'_, Result<IngestStats>> {
        let text = text.to_string();
        let source = source.to_string();

        Box::pin(async move {
            let chunks = chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);
            if chunks.is_empty() {
                return Ok(IngestStats {
                    chunks_added: 0,
                    preview: String::new(),
                });
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != chunks.len() {
                return Err(FlowstackError::Embedding(format!(
                    "Expected {} vectors, got {}",
                    chunks.len(),
                    embeddings.len()
                )));
            }

            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;
            for (i, (chunk, embedding)) in chunks.iter().zip(embeddings.iter()).enumerate() {
                conn.execute(
                    "INSERT INTO kb_chunks
                        (collection_id, source, chunk_index, char_start, char_end, content, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        collection_id,
                        source,
                        i as i64,
                        chunk.char_start as i64,
                        chunk.char_end as i64,
                        chunk.text,
                        Self::blob(embedding),
                    ],
                )
                .map_err(|e| FlowstackError::Database(e.to_string()))?;
            }

            debug!(collection_id, source = %source, chunks = chunks.len(), "Document ingested");
            Ok(IngestStats {
                chunks_added: chunks.len(),
                preview: chunks[0].text.chars().take(PREVIEW_LEN).collect(),
            })
        })
    }

    fn search(
        &self,
        query: &str,
        collection_id: i64,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalHit>>> {
        let query = query.to_string();

        Box::pin(async move {
            let query_vec = self
                .embedder
                .embed(&[query])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| FlowstackError::Embedding("Empty embedding response".into()))?;

            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let mut stmt = conn
                .prepare(
                    "SELECT content, source, chunk_index, char_start, char_end, embedding
                     FROM kb_chunks
                     WHERE collection_id = ?1",
                )
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let rows = stmt
                .query_map(params![collection_id], |row| {
                    let content: String = row.get(0)?;
                    let source: String = row.get(1)?;
                    let chunk_index: i64 = row.get(2)?;
                    let char_start: i64 = row.get(3)?;
                    let char_end: i64 = row.get(4)?;
                    let blob: Vec<u8> = row.get(5)?;
                    Ok((content, source, chunk_index, char_start, char_end, blob))
                })
                .map_err(|e| FlowstackError::Database(e.to_string()))?;

            let mut scored: Vec<(f32, RetrievalHit)> = Vec::new();
            for row in rows {
                let (content, source, chunk_index, char_start, char_end, blob) =
                    row.map_err(|e| FlowstackError::Database(e.to_string()))?;

                let sim = cosine_similarity(&query_vec, &Self::unblob(&blob));
                scored.push((
                    sim,
                    RetrievalHit {
                        text: content,
                        metadata: serde_json::json!({
                            "source": source,
                            "chunk_index": chunk_index,
                            "char_start": char_start,
                            "char_end": char_end,
                        }),
                        distance: (1.0 - sim) as f64,
                    },
                ));
            }

            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(top_k);

            Ok(scored.into_iter().map(|(_, hit)| hit).collect())
        })
    }

    fn clear(&self, collection_id: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| FlowstackError::Database(e.to_string()))?;
            conn.execute(
                "DELETE FROM kb_chunks WHERE collection_id = ?1",
                params![collection_id],
            )
            .map_err(|e| FlowstackError::Database(e.to_string()))?;

            debug!(collection_id, "Collection cleared");
            Ok(())
        })
    }
}
