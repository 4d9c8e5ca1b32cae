use crate::chunking::split_into_chunks;
use crate::embeddings::Embedder;
use crate::llm::LanguageModel;
use crate::vector_index::VectorIndex;
use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::RwLock;

/// RAG (Retrieval-Augmented Generation) engine
///
/// Holds the index of the most recently processed document. Indexing a new
/// document replaces it for every caller.
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Self {
        RagEngine {
            embedder,
            llm,
            current: RwLock::new(None),
        }
    }

    /// Chunk and embed a document, then make it the current index
    pub async fn index_document(&self, content: &str) -> Result<Arc<VectorIndex>> {
        let chunks = split_into_chunks(content);
        info!("Split text into {} chunks", chunks.len());

        if chunks.is_empty() {
            return Err(anyhow::anyhow!("Document has no text to index"));
        }

        let index = VectorIndex::build(chunks, self.embedder.as_ref())
            .await
            .context("Failed to create vector store")?;
        let index = Arc::new(index);

        *self.current.write().await = Some(index.clone());
        Ok(index)
    }

    /// Index of the most recently processed document, if any
    pub async fn current_index(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    /// Answer a prompt from the `k` chunks most similar to it
    pub async fn ask(&self, index: &VectorIndex, question: &str, k: usize) -> Result<String> {
        let question_embedding = self
            .embedder
            .embed_query(question)
            .await
            .context("Failed to embed question")?;

        let chunks = index.search(&question_embedding, k);
        debug!(
            "Retrieved chunks {:?} for prompt",
            chunks
                .iter()
                .map(|scored| (scored.chunk.index, scored.score))
                .collect::<Vec<_>>()
        );

        let context = chunks
            .iter()
            .map(|scored| scored.chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n");

        let prompt = build_prompt(&context, question);

        self.llm
            .generate(&prompt)
            .await
            .with_context(|| format!("Generation failed on {}", self.llm.model_name()))
    }
}

/// Place the retrieved context ahead of the question
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {}\n\nQuestion: {}\nHelpful Answer:",
        context,
        question.trim()
    )
}
