// Retriever: thin query adapter over the vector index.

#[cfg(test)]
mod tests;

use tracing::debug;

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::index::PineconeClient;
use crate::Result;

#[derive(Debug, Clone)]
pub struct Retriever {
    embeddings: EmbeddingClient,
    index: PineconeClient,
    top_k: usize,
}

/// A retrieved chunk with its provenance, in descending-similarity order.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub score: f32,
}

impl Retriever {
    #[inline]
    pub fn new(config: &Config, embeddings: EmbeddingClient, index: PineconeClient) -> Self {
        Self {
            embeddings,
            index,
            top_k: config.retrieval.top_k,
        }
    }

    /// Embed the question with the same model used at ingestion and return
    /// the top-k most similar chunks. An empty index yields an empty list.
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let vector = self.embeddings.embed(question).await?;
        let matches = self.index.query(&vector, self.top_k).await?;

        debug!(
            "Retrieved {} chunks for question ({} chars)",
            matches.len(),
            question.len()
        );

        Ok(matches
            .into_iter()
            .map(|m| RetrievedChunk {
                content: m.text,
                source: m.source,
                score: m.score,
            })
            .collect())
    }
}
