use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowstackError, Result};

/// Top-level Flowstack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowstackError::ConfigNotFound(path.display().to_string()))?;
        toml::from_str(&content).map_err(|e| FlowstackError::Config(e.to_string()))
    }

    /// Load from a file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "flowstack.db".to_string()
}

/// Connection settings for the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model-listing timeout. Unreachable backend within this window is
    /// treated as "no models installed", not as fatal.
    #[serde(default = "default_tags_timeout")]
    pub tags_timeout_secs: u64,
    /// Whole-request deadline for a model pull.
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_secs: u64,
    /// Whole-request deadline for a generation.
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            tags_timeout_secs: default_tags_timeout(),
            pull_timeout_secs: default_pull_timeout(),
            generate_timeout_secs: default_generate_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_tags_timeout() -> u64 {
    10
}

fn default_pull_timeout() -> u64 {
    600
}

fn default_generate_timeout() -> u64 {
    300
}

/// Embedding endpoint for the knowledge base (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            api_key: None,
        }
    }
}

fn default_embedding_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dims() -> usize {
    768
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.ollama.tags_timeout_secs, 10);
        assert_eq!(config.embedding.dims, 768);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.database.path, "flowstack.db");
        assert_eq!(config.ollama.generate_timeout_secs, 300);
    }
}
