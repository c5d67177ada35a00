use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::*;

/// Generation backend — availability check, on-demand provisioning, and
/// token streaming behind one call.
///
/// A returned stream is consumed once and not restartable; a fresh `stream`
/// call is required per generation.
pub trait GenerationBackend: Send + Sync + 'static {
    /// Start a generation and receive a lazy sequence of deltas.
    ///
    /// Provisioning progress surfaces as `GenDelta::Status` items before the
    /// first token.
    fn stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<GenDelta>>>>;
}

/// Knowledge base — chunk-embedding ingestion and similarity search, keyed
/// by collection (stack) id.
pub trait KnowledgeBase: Send + Sync + 'static {
    /// Chunk, embed, and store a document.
    fn ingest(
        &self,
        text: &str,
        collection_id: i64,
        source: &str,
    ) -> BoxFuture<'_, Result<IngestStats>>;

    /// Return the `top_k` chunks closest to the query.
    fn search(
        &self,
        query: &str,
        collection_id: i64,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalHit>>>;

    /// Drop every chunk in a collection.
    fn clear(&self, collection_id: i64) -> BoxFuture<'_, Result<()>>;
}

/// Stack store — persistence for named graph documents.
pub trait StackStore: Send + Sync + 'static {
    fn create(&self, name: &str, blocks: serde_json::Value)
        -> BoxFuture<'_, Result<StackRecord>>;

    fn get(&self, id: i64) -> BoxFuture<'_, Result<StackRecord>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<StackRecord>>>;

    fn update(
        &self,
        id: i64,
        name: &str,
        blocks: serde_json::Value,
    ) -> BoxFuture<'_, Result<StackRecord>>;

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<()>>;
}
