pub mod api;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod parser;
pub mod rag;
pub mod study;
pub mod vector_index;

#[cfg(test)]
mod test_support;
