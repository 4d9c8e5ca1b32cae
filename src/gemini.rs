use crate::embeddings::{Embedder, Embedding};
use crate::llm::LanguageModel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// The API rejects batch embedding requests with more entries than this
const MAX_EMBED_BATCH: usize = 100;

/// Carries the API key so it never appears in request URLs
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for Gemini API
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GOOGLE_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .context("GOOGLE_API_KEY environment variable is required")?;

        let base_url = env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let embedding_model = env::var("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        Ok(GeminiConfig {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            embedding_model,
            temperature: 0.3,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    /// Generate an embedding for a single text
    pub async fn get_embedding(&self, text: &str, task_type: TaskType) -> Result<Embedding> {
        let request = EmbedContentRequest::new(&self.embedding_model_path(), text, task_type);
        let url = self
            .config
            .endpoint(&self.config.embedding_model, "embedContent");

        let response: EmbedContentResponse = self.post_json(&url, &request).await?;

        Ok(Embedding {
            values: response.embedding.values,
        })
    }

    /// Generate embeddings for many texts, batching requests to the API limit
    pub async fn get_embeddings(&self, texts: &[String], task_type: TaskType) -> Result<Vec<Embedding>> {
        let model = self.embedding_model_path();
        let url = self
            .config
            .endpoint(&self.config.embedding_model, "batchEmbedContents");
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let request = BatchEmbedContentsRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedContentRequest::new(&model, text, task_type))
                    .collect(),
            };

            let response: BatchEmbedContentsResponse = self.post_json(&url, &request).await?;
            if response.embeddings.len() != batch.len() {
                return Err(anyhow::anyhow!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                ));
            }

            embeddings.extend(
                response
                    .embeddings
                    .into_iter()
                    .map(|data| Embedding { values: data.values }),
            );
            debug!("Embedded {} of {} chunks", embeddings.len(), texts.len());
        }

        Ok(embeddings)
    }

    /// Generate text using the configured Gemini model
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let url = self.config.endpoint(&self.config.model, "generateContent");
        let response: GenerateResponse = self.post_json(&url, &request).await?;

        // Extract the generated text from the response
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }

    fn embedding_model_path(&self) -> String {
        format!("models/{}", self.config.embedding_model)
    }

    async fn post_json<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed: {} {}",
                status,
                error_text
            ));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.get_embedding(text, TaskType::RetrievalQuery).await
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.get_embeddings(texts, TaskType::RetrievalDocument).await
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// How an embedding is going to be used
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
}

impl<'a> EmbedContentRequest<'a> {
    fn new(model: &str, text: &'a str, task_type: TaskType) -> Self {
        EmbedContentRequest {
            model: model.to_string(),
            content: Content {
                parts: vec![Part { text }],
                role: None,
            },
            task_type,
        }
    }
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbedContentResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: Some(role),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}
