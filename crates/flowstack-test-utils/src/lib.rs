//! Shared test doubles for Flowstack crates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};

use flowstack_core::error::{FlowstackError, Result};
use flowstack_core::traits::{GenerationBackend, KnowledgeBase};
use flowstack_core::types::{GenDelta, IngestStats, RetrievalHit};

/// Scripted generation backend.
///
/// Plays back a fixed delta sequence per `stream` call and records how it
/// was called, so tests can assert call counts and the exact model/prompt
/// that reached the backend.
pub struct MockBackend {
    script: Vec<std::result::Result<GenDelta, String>>,
    connect_error: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, String)>>,
}

impl MockBackend {
    /// Backend that streams the given tokens and completes.
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self::with_script(
            tokens
                .iter()
                .map(|t| Ok(GenDelta::Token((*t).to_string())))
                .collect(),
        )
    }

    /// Backend that plays back an arbitrary delta script. `Err` entries
    /// become in-stream transport failures.
    pub fn with_script(script: Vec<std::result::Result<GenDelta, String>>) -> Self {
        Self {
            script,
            connect_error: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Backend whose `stream` call itself fails.
    pub fn failing(message: &str) -> Self {
        Self {
            script: Vec::new(),
            connect_error: Some(message.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Number of `stream` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The (model, prompt) pair of the most recent `stream` call.
    pub fn last_request(&self) -> Option<(String, String)> {
        self.last_request.lock().unwrap().clone()
    }
}

impl GenerationBackend for MockBackend {
    fn stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<GenDelta>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((model.to_string(), prompt.to_string()));

        let script = self.script.clone();
        let connect_error = self.connect_error.clone();
        Box::pin(async move {
            if let Some(msg) = connect_error {
                return Err(FlowstackError::BackendUnavailable(msg));
            }
            Ok(futures::stream::iter(
                script
                    .into_iter()
                    .map(|r| r.map_err(FlowstackError::BackendStream)),
            )
            .boxed())
        })
    }
}

/// Canned knowledge base: records ingests, serves fixed hits, forgets on
/// clear.
#[derive(Default)]
pub struct StubKnowledgeBase {
    hits: Vec<RetrievalHit>,
    ingests: Mutex<Vec<(String, i64, String)>>,
}

impl StubKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(hits: Vec<RetrievalHit>) -> Self {
        Self {
            hits,
            ingests: Mutex::new(Vec::new()),
        }
    }

    /// Every (text, collection_id, source) triple ingested so far.
    pub fn ingests(&self) -> Vec<(String, i64, String)> {
        self.ingests.lock().unwrap().clone()
    }
}

impl KnowledgeBase for StubKnowledgeBase {
    fn ingest(
        &self,
        text: &str,
        collection_id: i64,
        source: &str,
    ) -> BoxFuture<'_, Result<IngestStats>> {
        self.ingests
            .lock()
            .unwrap()
            .push((text.to_string(), collection_id, source.to_string()));
        let preview: String = text.chars().take(500).collect();
        Box::pin(async move {
            Ok(IngestStats {
                chunks_added: 1,
                preview,
            })
        })
    }

    fn search(
        &self,
        _query: &str,
        _collection_id: i64,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalHit>>> {
        let mut hits = self.hits.clone();
        hits.truncate(top_k);
        Box::pin(async move { Ok(hits) })
    }

    fn clear(&self, _collection_id: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { Ok(()) })
    }
}
