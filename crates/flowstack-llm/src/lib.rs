pub mod lines;
pub mod ollama;

pub use lines::LineParser;
pub use ollama::OllamaClient;
