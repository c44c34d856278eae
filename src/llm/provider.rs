use async_trait::async_trait;

use crate::core::errors::ApiError;
use super::types::{ChatRequest, ModerationVerdict};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming); the first choice's text, or "" when absent
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// generate embeddings, one vector per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;

    /// classify text against the provider's content policy
    async fn moderate(&self, input: &str) -> Result<ModerationVerdict, ApiError>;
}

/// Embeds a single text, failing when the provider returns no vector.
pub async fn embed_one(
    provider: &dyn LlmProvider,
    input: &str,
    model_id: &str,
) -> Result<Vec<f32>, ApiError> {
    let mut vectors = provider.embed(&[input.to_string()], model_id).await?;
    if vectors.is_empty() {
        return Err(ApiError::Internal(format!(
            "{} returned no embedding",
            provider.name()
        )));
    }
    let vector = vectors.swap_remove(0);
    if vector.is_empty() {
        return Err(ApiError::Internal(format!(
            "{} returned an empty embedding",
            provider.name()
        )));
    }
    Ok(vector)
}
