use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::index::PineconeClient;
use crate::ingest::IngestPipeline;
use crate::server;

/// Run the offline ingestion job against a corpus directory.
#[inline]
pub async fn ingest(config: &Config, dir: &Path) -> Result<()> {
    info!("Ingesting corpus from {}", dir.display());

    let pipeline = IngestPipeline::new(config).context("Failed to initialize pipeline")?;
    let stats = pipeline.run(dir).await.context("Ingestion failed")?;

    println!("Ingestion completed successfully!");
    println!("  PDF files: {}", stats.files);
    println!("  Pages loaded: {}", stats.pages);
    println!("  Chunks created: {}", stats.chunks);
    println!("  Vectors upserted: {}", stats.vectors_upserted);
    println!();
    println!(
        "Index '{}' is ready. Use 'medbot serve' to start the chat service.",
        config.pinecone.index_name
    );

    Ok(())
}

/// Start the chat web service.
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    println!(
        "Starting chat service on http://{}:{}",
        config.server.host, config.server.port
    );
    println!("Press Ctrl+C to stop");

    server::run(config).await.context("Server failed")?;
    Ok(())
}

/// Report external collaborator health and index statistics.
#[inline]
pub async fn status(config: &Config) -> Result<()> {
    println!("📊 Medbot Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🧮 Embedding Endpoint:");
    match EmbeddingClient::new(config) {
        Ok(client) => match client.health_check().await {
            Ok(()) => {
                println!("   ✅ Reachable: {}", config.embedding.base_url);
                println!("   📋 Model: {}", config.embedding.model);
                println!("   🔢 Dimension: {}", config.embedding.dimension);
            }
            Err(e) => println!("   ❌ Unhealthy - {e}"),
        },
        Err(e) => println!("   ❌ Failed to construct client - {e}"),
    }

    println!();
    println!("🔍 Vector Index:");
    match PineconeClient::new(config) {
        Ok(client) => match client.stats().await {
            Ok(stats) => {
                println!("   ✅ Index: {}", config.pinecone.index_name);
                println!("   📄 Vectors: {}", stats.total_vector_count);
                println!("   🔢 Dimension: {}", stats.dimension);
                if stats.total_vector_count == 0 {
                    println!("   ⚠️  Index is empty - run 'medbot ingest <dir>' first");
                }
            }
            Err(e) => println!("   ❌ Unreachable - {e}"),
        },
        Err(e) => println!("   ❌ Failed to construct client - {e}"),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'medbot ingest <dir>' to (re)index a PDF corpus");
    println!("   • Use 'medbot serve' to start the chat service");

    Ok(())
}
