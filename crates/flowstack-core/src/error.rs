use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowstackError {
    // Graph errors
    #[error("{0}")]
    MalformedGraph(String),

    #[error("Could not determine execution path")]
    PathUnresolved,

    #[error("No generation node in path")]
    MissingGenerationNode,

    #[error("Missing user query")]
    MissingQuery,

    // Generation backend errors
    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Generation backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Generation stream error: {0}")]
    BackendStream(String),

    // Knowledge base errors
    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Document extraction failed: {0}")]
    Extraction(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Stack not found: {0}")]
    StackNotFound(i64),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowstackError>;
