// Pinecone index client
// Control plane: idempotent index creation by name. Data plane: batch
// upserts and top-k cosine similarity queries against the index host.

#[cfg(test)]
mod tests;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::{BotError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const API_VERSION: &str = "2025-01";
const UPSERT_BATCH_SIZE: usize = 100;

/// Client for one named Pinecone index.
#[derive(Debug)]
pub struct PineconeClient {
    http: Client,
    control_plane_url: String,
    api_key: String,
    index_name: String,
    dimension: usize,
    cloud: String,
    region: String,
    // Data-plane base URL, resolved once from the control plane.
    data_url: OnceCell<String>,
}

/// One (vector, text, source) record as persisted in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    pub text: String,
    pub source: String,
}

/// A similarity-search hit, in descending score order.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: usize,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    dimension: usize,
    metric: String,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: CreateIndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct CreateIndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexEntry],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<EntryMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    dimension: usize,
}

impl PineconeClient {
    /// Build a client from config. Fails immediately when the API key is
    /// absent from the environment.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config::pinecone_api_key().map_err(|e| BotError::Config(e.to_string()))?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| BotError::Index(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            control_plane_url: config
                .pinecone
                .control_plane_url
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            index_name: config.pinecone.index_name.clone(),
            dimension: config.embedding.dimension as usize,
            cloud: config.pinecone.cloud.clone(),
            region: config.pinecone.region.clone(),
            data_url: OnceCell::new(),
        })
    }

    /// Create the index if it does not exist yet, reuse it otherwise.
    /// Safe to call repeatedly; errors only when an existing index disagrees
    /// on dimension or metric.
    #[inline]
    pub async fn ensure_index(&self) -> Result<()> {
        self.data_url().await.map(|_| ())
    }

    /// Upsert entries in batches. Entries carry deterministic IDs, so
    /// re-upserting the same corpus overwrites rather than duplicates.
    #[inline]
    pub async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/vectors/upsert", self.data_url().await?);
        let mut upserted = 0;

        for batch in entries.chunks(UPSERT_BATCH_SIZE) {
            let response = self
                .request(self.http.post(&url))
                .json(&UpsertRequest { vectors: batch })
                .send()
                .await
                .map_err(|e| BotError::Index(format!("Upsert request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BotError::Index(format!("Upsert returned {status}: {body}")));
            }

            upserted += batch.len();
            debug!("Upserted batch of {} vectors", batch.len());
        }

        Ok(upserted)
    }

    /// Top-k cosine similarity query. An empty index yields an empty match
    /// list, not an error.
    #[inline]
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>> {
        let url = format!("{}/query", self.data_url().await?);

        let response = self
            .request(self.http.post(&url))
            .json(&QueryRequest {
                vector,
                top_k,
                include_metadata: true,
            })
            .send()
            .await
            .map_err(|e| BotError::Index(format!("Query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Index(format!("Query returned {status}: {body}")));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| BotError::Index(format!("Invalid query response: {e}")))?;

        let matches = parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                m.metadata.map(|metadata| SearchMatch {
                    id: m.id,
                    score: m.score,
                    text: metadata.text,
                    source: metadata.source,
                })
            })
            .collect();

        Ok(matches)
    }

    /// Index statistics, used by the status command.
    #[inline]
    pub async fn stats(&self) -> Result<IndexStats> {
        let url = format!("{}/describe_index_stats", self.data_url().await?);

        let response = self
            .request(self.http.post(&url))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| BotError::Index(format!("Stats request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Index(format!("Stats returned {status}: {body}")));
        }

        let parsed: StatsResponse = response
            .json()
            .await
            .map_err(|e| BotError::Index(format!("Invalid stats response: {e}")))?;

        Ok(IndexStats {
            total_vector_count: parsed.total_vector_count,
            dimension: parsed.dimension,
        })
    }

    async fn data_url(&self) -> Result<&str> {
        self.data_url
            .get_or_try_init(|| async {
                let description = self.describe_or_create().await?;
                Ok::<_, BotError>(host_to_url(&description.host))
            })
            .await
            .map(String::as_str)
    }

    async fn describe_or_create(&self) -> Result<IndexDescription> {
        if let Some(description) = self.describe_index().await? {
            debug!("Index {} already exists, reusing it", self.index_name);
            self.check_compatible(&description)?;
            return Ok(description);
        }

        info!(
            "Creating index {} ({}-dimensional, cosine, serverless {}/{})",
            self.index_name, self.dimension, self.cloud, self.region
        );
        let description = self.create_index().await?;
        self.check_compatible(&description)?;
        Ok(description)
    }

    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_plane_url, self.index_name);

        let response = self
            .request(self.http.get(&url))
            .send()
            .await
            .map_err(|e| BotError::Index(format!("Describe index request failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let description = response.json().await.map_err(|e| {
                    BotError::Index(format!("Invalid describe index response: {e}"))
                })?;
                Ok(Some(description))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BotError::Index(format!(
                    "Describe index returned {status}: {body}"
                )))
            }
        }
    }

    async fn create_index(&self) -> Result<IndexDescription> {
        let url = format!("{}/indexes", self.control_plane_url);

        let response = self
            .request(self.http.post(&url))
            .json(&CreateIndexRequest {
                name: &self.index_name,
                dimension: self.dimension,
                metric: "cosine",
                spec: CreateIndexSpec {
                    serverless: ServerlessSpec {
                        cloud: &self.cloud,
                        region: &self.region,
                    },
                },
            })
            .send()
            .await
            .map_err(|e| BotError::Index(format!("Create index request failed: {e}")))?;

        match response.status() {
            // Someone else created it between our describe and create calls.
            StatusCode::CONFLICT => self.describe_index().await?.ok_or_else(|| {
                BotError::Index(format!(
                    "Index {} reported as existing but cannot be described",
                    self.index_name
                ))
            }),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| BotError::Index(format!("Invalid create index response: {e}"))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BotError::Index(format!(
                    "Create index returned {status}: {body}"
                )))
            }
        }
    }

    fn check_compatible(&self, description: &IndexDescription) -> Result<()> {
        if description.dimension != self.dimension {
            return Err(BotError::Index(format!(
                "Index {} has dimension {}, expected {}; re-ingest into a fresh index",
                self.index_name, description.dimension, self.dimension
            )));
        }
        if description.metric != "cosine" {
            return Err(BotError::Index(format!(
                "Index {} uses metric {:?}, expected cosine",
                self.index_name, description.metric
            )));
        }
        Ok(())
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-Api-Version", API_VERSION)
    }
}

impl Clone for PineconeClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            control_plane_url: self.control_plane_url.clone(),
            api_key: self.api_key.clone(),
            index_name: self.index_name.clone(),
            dimension: self.dimension,
            cloud: self.cloud.clone(),
            region: self.region.clone(),
            data_url: OnceCell::new_with(self.data_url.get().cloned()),
        }
    }
}

// The control plane reports a bare hostname for the data plane.
fn host_to_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}
