use crate::parser::{parse_flashcards, parse_notes, Flashcard};
use crate::rag::RagEngine;
use crate::vector_index::VectorIndex;
use log::{error, info};
use serde::Serialize;
use thiserror::Error;

const SUMMARY_K: usize = 3;
const NOTES_K: usize = 4;
const FLASHCARDS_K: usize = 4;
const QUERY_K: usize = 4;

const SUMMARY_PROMPT: &str = "\
Based on the provided text, create a comprehensive summary that captures the main ideas, \
key concepts, and important details. The summary should be well-structured and easy to understand.

Please provide a summary that:
1. Highlights the most important points
2. Maintains logical flow
3. Is concise but comprehensive
4. Uses clear language";

const NOTES_PROMPT: &str = "\
Extract the most important key points and concepts from the provided text. \
Present them as a list of concise, well-structured notes.

Each note should:
1. Capture a single important concept or idea
2. Be clear and easy to understand
3. Be actionable for studying
4. Be specific and informative

Provide 5-10 key notes from this text.
Format each note as a complete sentence or phrase.";

const FLASHCARDS_PROMPT: &str = "\
Create study flashcards from the provided text. Each flashcard should have a clear question \
and a comprehensive answer.

Generate 5-8 flashcards that:
1. Test understanding of key concepts
2. Have clear, specific questions
3. Have detailed, accurate answers
4. Cover different aspects of the material

Format each flashcard as:
Q: [Question]
A: [Answer]

Separate each flashcard with a blank line.";

const SUMMARY_FAILED: &str = "Failed to generate summary. Please try again.";
const NOTES_FAILED: &str = "Failed to generate notes. Please try again.";

/// Everything generated for one uploaded document
#[derive(Debug, Clone, Serialize)]
pub struct StudyMaterials {
    pub summary: String,
    pub notes: Vec<String>,
    pub flashcards: Vec<Flashcard>,
}

impl StudyMaterials {
    /// Placeholder returned when the document could not be indexed at all
    pub fn failed() -> Self {
        StudyMaterials {
            summary: "Failed to generate summary.".to_string(),
            notes: vec!["Failed to generate notes.".to_string()],
            flashcards: vec![Flashcard::new("Error occurred", "Please try again.")],
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no document has been processed yet")]
    NoDocument,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Generates study materials and answers follow-up questions
pub struct StudyService {
    rag: RagEngine,
}

impl StudyService {
    pub fn new(rag: RagEngine) -> Self {
        StudyService { rag }
    }

    /// Index the text, then produce a summary, notes and flashcards from it
    pub async fn generate_study_materials(&self, text: &str) -> StudyMaterials {
        info!("Starting study materials generation...");

        let index = match self.rag.index_document(text).await {
            Ok(index) => index,
            Err(e) => {
                error!("Error generating study materials: {:#}", e);
                return StudyMaterials::failed();
            }
        };

        let materials = StudyMaterials {
            summary: self.generate_summary(&index).await,
            notes: self.generate_notes(&index).await,
            flashcards: self.generate_flashcards(&index).await,
        };

        info!(
            "Study materials generated: {} notes, {} flashcards",
            materials.notes.len(),
            materials.flashcards.len()
        );
        materials
    }

    pub async fn generate_summary(&self, index: &VectorIndex) -> String {
        match self.rag.ask(index, SUMMARY_PROMPT, SUMMARY_K).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                error!("Error generating summary: {:#}", e);
                SUMMARY_FAILED.to_string()
            }
        }
    }

    pub async fn generate_notes(&self, index: &VectorIndex) -> Vec<String> {
        match self.rag.ask(index, NOTES_PROMPT, NOTES_K).await {
            Ok(reply) => parse_notes(&reply),
            Err(e) => {
                error!("Error generating notes: {:#}", e);
                vec![NOTES_FAILED.to_string()]
            }
        }
    }

    pub async fn generate_flashcards(&self, index: &VectorIndex) -> Vec<Flashcard> {
        match self.rag.ask(index, FLASHCARDS_PROMPT, FLASHCARDS_K).await {
            Ok(reply) => parse_flashcards(&reply),
            Err(e) => {
                error!("Error generating flashcards: {:#}", e);
                vec![Flashcard::new(
                    "Error generating flashcards",
                    "Please try again with a different document.",
                )]
            }
        }
    }

    /// Answer a free-form question about the last processed document
    pub async fn query_response(&self, message: &str) -> Result<String, QueryError> {
        let index = self
            .rag
            .current_index()
            .await
            .ok_or(QueryError::NoDocument)?;

        let answer = self.rag.ask(&index, message, QUERY_K).await?;
        Ok(answer.trim().to_string())
    }
}
