// Embedding client module
// One model, one configuration, used identically at ingestion and query
// time: vector-space consistency depends on it.


use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::{BotError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// HTTP client for a Hugging Face feature-extraction endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    api_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| BotError::Embedding(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.embedding.base_url.trim_end_matches('/').to_string(),
            model: config.embedding.model.clone(),
            dimension: config.embedding.dimension as usize,
            batch_size: config.embedding.batch_size as usize,
            api_token: config::hf_api_token(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single text, e.g. a query at retrieval time.
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_single_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| BotError::Embedding("Empty embedding response".to_string()))
    }

    /// Embed many texts, batched at the configured batch size so large
    /// corpora do not produce oversized requests.
    #[inline]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            results.extend(self.embed_single_batch(batch).await?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    /// Verify that the endpoint responds and produces vectors of the
    /// configured dimension.
    #[inline]
    pub async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        info!(
            "Embedding endpoint healthy: {} ({}-dimensional)",
            self.model, self.dimension
        );
        Ok(())
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/{}/pipeline/feature-extraction",
            self.base_url, self.model
        );

        let mut request = self.http.post(&url).json(&EmbedRequest { inputs: texts });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BotError::Embedding(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Embedding(format!(
                "Embedding endpoint returned {status}: {body}"
            )));
        }

        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| BotError::Embedding(format!("Invalid embedding response: {e}")))?;

        if vectors.len() != texts.len() {
            return Err(BotError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                vectors.len()
            )));
        }

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(BotError::Embedding(format!(
                    "Expected {}-dimensional vectors, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        Ok(vectors)
    }
}
