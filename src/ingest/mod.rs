// Ingestion pipeline
// Offline batch job: load PDFs, minimize, split, embed, and upsert into the
// vector index. The index is the system of record; nothing is kept locally.


use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::chunking::{self, TextSplitter};
use crate::config::Config;
use crate::corpus;
use crate::embeddings::EmbeddingClient;
use crate::index::{EntryMetadata, IndexEntry, PineconeClient};
use crate::Result;

pub struct IngestPipeline {
    splitter: TextSplitter,
    embeddings: EmbeddingClient,
    index: PineconeClient,
    batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestStats {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
    pub vectors_upserted: usize,
}

impl IngestPipeline {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            splitter: TextSplitter::new(&config.chunking),
            embeddings: EmbeddingClient::new(config)?,
            index: PineconeClient::new(config)?,
            batch_size: config.embedding.batch_size as usize,
        })
    }

    /// Run the whole pipeline for one corpus directory. All-or-nothing: the
    /// first failure propagates and nothing tracks partial progress.
    #[inline]
    pub async fn run(&self, dir: &Path) -> Result<IngestStats> {
        let documents = corpus::load_pdf_files(dir)?;
        let files: HashSet<_> = documents.iter().map(|d| d.source.clone()).collect();
        let pages = documents.len();

        let minimal_docs = corpus::filter_to_minimal_docs(&documents);
        let chunks = self.splitter.split_documents(&minimal_docs);
        info!(
            "Corpus prepared: {} files, {} pages, {} chunks",
            files.len(),
            pages,
            chunks.len()
        );

        self.index.ensure_index().await?;

        let mut vectors_upserted = 0;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embeddings.embed_batch(&texts).await?;

            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| IndexEntry {
                    id: chunking::chunk_id(chunk),
                    values,
                    metadata: EntryMetadata {
                        text: chunk.content.clone(),
                        source: chunk.source.clone(),
                    },
                })
                .collect();

            vectors_upserted += self.index.upsert(&entries).await?;
            debug!("Upserted {}/{} chunks", vectors_upserted, chunks.len());
        }

        Ok(IngestStats {
            files: files.len(),
            pages,
            chunks: chunks.len(),
            vectors_upserted,
        })
    }
}
