use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use anyhow::{Context, Result};
use log::{debug, info};
use std::cmp::Ordering;

/// A chunk returned from a similarity search
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: TextChunk,
    embedding: Embedding,
}

/// In-memory similarity index over the chunks of one document
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair chunks with their embeddings
    pub fn from_parts(chunks: Vec<TextChunk>, embeddings: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(anyhow::anyhow!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            ));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Ok(VectorIndex { entries })
    }

    /// Embed every chunk and build an index from the results
    pub async fn build(chunks: Vec<TextChunk>, embedder: &dyn Embedder) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder
            .embed_documents(&texts)
            .await
            .context("Failed to embed document chunks")?;

        let index = Self::from_parts(chunks, embeddings)?;
        info!("Vector index built with {} chunks", index.len());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return up to `limit` chunks ordered by descending cosine similarity
    pub fn search(&self, query: &Embedding, limit: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: entry.embedding.cosine_similarity(query),
            })
            .collect();

        // Ties keep document order
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(limit);

        debug!("Search returned {} chunks", scored.len());
        scored
    }
}
