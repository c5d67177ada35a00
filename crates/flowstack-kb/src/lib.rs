//! Per-stack knowledge base: sliding-window chunking, HTTP embeddings, and
//! SQLite-backed cosine-similarity search, plus PDF text extraction for the
//! upload path.

pub mod chunk;
pub mod embeddings;
pub mod extract;
pub mod store;

pub use chunk::{chunk_text, Chunk, CHUNK_OVERLAP, CHUNK_SIZE};
pub use embeddings::{cosine_similarity, EmbeddingProvider, HttpEmbeddingProvider};
pub use extract::pdf_text;
pub use store::SqliteKnowledgeBase;
