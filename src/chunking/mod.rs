
use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::corpus::MinimalDoc;

/// Boundary preference order for recursive splitting: paragraph, line,
/// sentence, word. Character-level splitting is the implicit last resort.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// A bounded slice of a source document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
}

/// Recursive boundary-aware text splitter.
///
/// Splitting is split-inclusive: each piece keeps its trailing separator, so
/// every produced chunk is a contiguous substring of the input and
/// consecutive chunks of one document share a suffix/prefix of at most
/// `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }

    /// Split raw text into chunks of at most `chunk_size` characters.
    #[inline]
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    /// Split each document into chunks, preserving in-document order and
    /// carrying the `source` metadata through unchanged. Chunks from
    /// different documents never share text.
    #[inline]
    pub fn split_documents(&self, docs: &[MinimalDoc]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in docs {
            let pieces = self.split(&doc.content);
            debug!("Split {} into {} chunks", doc.source, pieces.len());
            for (chunk_index, content) in pieces.into_iter().enumerate() {
                chunks.push(Chunk {
                    content,
                    source: doc.source.clone(),
                    chunk_index,
                });
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (pieces, remaining) = match separators.split_first() {
            Some((sep, rest)) if text.contains(sep) => {
                (split_inclusive(text, sep), Some(rest))
            }
            Some((_, rest)) if !rest.is_empty() => return self.split_recursive(text, rest),
            // Last resort: per-character pieces. Nothing is indivisible below
            // this level, so the size bound always holds.
            _ => (text.chars().map(String::from).collect(), None),
        };

        let mut final_chunks = Vec::new();
        let mut mergeable = Vec::new();

        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                mergeable.push(piece);
                continue;
            }

            // Oversized piece: flush what we have, then recurse with finer
            // separators so order within the document is preserved.
            if !mergeable.is_empty() {
                final_chunks.extend(self.merge_pieces(&mergeable));
                mergeable.clear();
            }
            match remaining {
                Some(rest) => final_chunks.extend(self.split_recursive(&piece, rest)),
                None => final_chunks.push(piece),
            }
        }

        if !mergeable.is_empty() {
            final_chunks.extend(self.merge_pieces(&mergeable));
        }

        final_chunks.retain(|c| !c.trim().is_empty());
        final_chunks
    }

    /// Greedily concatenate consecutive pieces up to `chunk_size`, re-seeding
    /// each new chunk with at most `chunk_overlap` trailing characters of its
    /// predecessor.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());

                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece.as_str(), len));
            total += len;
        }

        if !window.is_empty() {
            chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
        }

        chunks
    }
}

/// Stable identity for an index entry: the same (source, position, content)
/// always hashes to the same ID, which makes re-ingestion overwrite instead
/// of duplicate.
#[inline]
pub fn chunk_id(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.source.as_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.chunk_index.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.content.as_bytes());
    hex::encode(hasher.finalize())
}

fn split_inclusive(text: &str, sep: &str) -> Vec<String> {
    text.split_inclusive(sep).map(String::from).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
