// Configuration management module
// Non-secret settings live in an optional TOML file next to the binary;
// API keys come only from the environment.


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

pub const PINECONE_API_KEY_VAR: &str = "PINECONE_API_KEY";
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";
pub const HF_API_TOKEN_VAR: &str = "HF_API_TOKEN";

pub const DEFAULT_CONFIG_FILE: &str = "medbot.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pinecone: PineconeConfig,
    pub embedding: EmbeddingConfig,
    pub groq: GroqConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PineconeConfig {
    pub control_plane_url: String,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            control_plane_url: "https://api.pinecone.io".to_string(),
            index_name: "medical-chatbot".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: u32,
    pub batch_size: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.huggingface.co/hf-inference/models".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroqConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_history_turns: usize,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "meta-llama/llama-4-maverick-17b-128e-instruct".to_string(),
            temperature: 0.2,
            max_history_turns: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same document.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid index name: {0:?} (cannot be empty)")]
    InvalidIndexName(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid history window: {0} (must be between 1 and 200 turns)")]
    InvalidHistoryWindow(usize),
    #[error("Missing required environment variable: {0}")]
    MissingApiKey(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from the given file, or from `medbot.toml` in the
    /// working directory. A missing file yields the defaults.
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        if !path.exists() {
            let config = Self::default();
            config.validate().context("Default configuration is invalid")?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [
            &self.pinecone.control_plane_url,
            &self.embedding.base_url,
            &self.groq.base_url,
        ] {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }

        if self.pinecone.index_name.trim().is_empty() {
            return Err(ConfigError::InvalidIndexName(
                self.pinecone.index_name.clone(),
            ));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.model.clone()));
        }

        if self.groq.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.groq.model.clone()));
        }

        if !(64..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }

        if self.embedding.batch_size == 0 || self.embedding.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embedding.batch_size));
        }

        if self.chunking.chunk_size == 0 || self.chunking.chunk_size > 8192 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }

        // Overlap >= chunk size would never make forward progress when splitting.
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.chunk_overlap,
                self.chunking.chunk_size,
            ));
        }

        if self.retrieval.top_k == 0 || self.retrieval.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if !(0.0..=2.0).contains(&self.groq.temperature) {
            return Err(ConfigError::InvalidTemperature(self.groq.temperature));
        }

        if self.groq.max_history_turns == 0 || self.groq.max_history_turns > 200 {
            return Err(ConfigError::InvalidHistoryWindow(
                self.groq.max_history_turns,
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        Ok(())
    }
}

/// Required Pinecone API key. Read at client construction so that a missing
/// key fails before any network call is attempted.
#[inline]
pub fn pinecone_api_key() -> Result<String, ConfigError> {
    std::env::var(PINECONE_API_KEY_VAR)
        .map_err(|_| ConfigError::MissingApiKey(PINECONE_API_KEY_VAR))
}

/// Required Groq API key.
#[inline]
pub fn groq_api_key() -> Result<String, ConfigError> {
    std::env::var(GROQ_API_KEY_VAR).map_err(|_| ConfigError::MissingApiKey(GROQ_API_KEY_VAR))
}

/// Optional bearer token for the embedding endpoint.
#[inline]
pub fn hf_api_token() -> Option<String> {
    std::env::var(HF_API_TOKEN_VAR).ok().filter(|t| !t.is_empty())
}
