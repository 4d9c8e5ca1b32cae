use anyhow::Result;
use async_trait::async_trait;

/// A remote text generation model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}
