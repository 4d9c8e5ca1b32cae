//! In-process stand-ins for the embedding and generation APIs.

use crate::embeddings::{Embedder, Embedding};
use crate::llm::LanguageModel;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const DIMENSIONS: usize = 64;

/// Bag-of-words embedder: texts sharing words land close together
pub struct FakeEmbedder;

impl FakeEmbedder {
    fn embed(text: &str) -> Embedding {
        let mut values = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            values[(hasher.finish() as usize) % DIMENSIONS] += 1.0;
        }
        Embedding::new(values)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        Ok(Self::embed(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Embedding> {
        Err(anyhow::anyhow!("embedding service unavailable"))
    }

    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
        Err(anyhow::anyhow!("embedding service unavailable"))
    }
}

/// Replies according to the first rule whose keyword appears in the prompt
pub struct ScriptedModel {
    rules: Vec<(String, String)>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        ScriptedModel {
            rules: Vec::new(),
            fallback: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model with no fallback fails on prompts no rule matches
    pub fn strict() -> Self {
        ScriptedModel {
            rules: Vec::new(),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn when(mut self, keyword: &str, reply: &str) -> Self {
        self.rules.push((keyword.to_string(), reply.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        self.rules
            .iter()
            .find(|(keyword, _)| prompt.contains(keyword.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow::anyhow!("model refused the prompt"))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
