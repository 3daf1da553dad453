// Corpus loading module
// Discovers PDF files under a directory and extracts one document per page.


use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{BotError, Result};

/// One page of a source PDF, as produced by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    pub content: String,
    pub source: PathBuf,
    pub page: u32,
}

/// A document reduced to the fields retained downstream: the text and the
/// originating file path. All other provenance (page numbers, parser
/// details) is intentionally discarded here.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimalDoc {
    pub content: String,
    pub source: String,
}

/// Recursively discover `*.pdf` files under `dir` and parse each into one
/// document per page. This is a batch, all-or-nothing job: a missing
/// directory, an unreadable entry, or an unparsable file propagates an error.
#[inline]
pub fn load_pdf_files(dir: &Path) -> Result<Vec<PageDocument>> {
    if !dir.is_dir() {
        return Err(BotError::Corpus(format!(
            "Corpus directory not found: {}",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| BotError::Corpus(format!("Failed to walk corpus: {e}")))?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("pdf") {
            paths.push(path.to_path_buf());
        }
    }
    // Deterministic ingestion order regardless of filesystem iteration order.
    paths.sort();

    if paths.is_empty() {
        return Err(BotError::Corpus(format!(
            "No PDF files found under {}",
            dir.display()
        )));
    }

    info!("Loading {} PDF files from {}", paths.len(), dir.display());

    let mut documents = Vec::new();
    for path in &paths {
        let pages = load_pdf(path)?;
        debug!("Loaded {} pages from {}", pages.len(), path.display());
        documents.extend(pages);
    }

    Ok(documents)
}

fn load_pdf(path: &Path) -> Result<Vec<PageDocument>> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| BotError::Corpus(format!("Failed to parse {}: {e}", path.display())))?;

    let mut pages = Vec::new();
    for (page, _) in doc.get_pages() {
        let content = doc.extract_text(&[page]).map_err(|e| {
            BotError::Corpus(format!(
                "Failed to extract text from {} page {page}: {e}",
                path.display()
            ))
        })?;
        pages.push(PageDocument {
            content,
            source: path.to_path_buf(),
            page,
        });
    }

    Ok(pages)
}

/// Strip loaded documents down to content plus the `source` path. The
/// resulting metadata contains exactly one field.
#[inline]
pub fn filter_to_minimal_docs(docs: &[PageDocument]) -> Vec<MinimalDoc> {
    docs.iter()
        .map(|doc| MinimalDoc {
            content: doc.content.clone(),
            source: doc.source.to_string_lossy().into_owned(),
        })
        .collect()
}
