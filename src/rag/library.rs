use std::sync::Arc;

use super::store::{DocumentPreview, DocumentStore, NewDocument, StoredDocument};
use crate::core::errors::ApiError;
use crate::llm::{embed_one, LlmProvider};

/// Knowledge-base operations: validation and embedding in front of the store.
#[derive(Clone)]
pub struct DocumentLibrary {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
    preview_chars: usize,
}

impl DocumentLibrary {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn LlmProvider>,
        embedding_model: impl Into<String>,
        preview_chars: usize,
    ) -> Self {
        Self {
            store,
            provider,
            embedding_model: embedding_model.into(),
            preview_chars,
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Embeds and stores a document. Content is kept verbatim; a blank title
    /// is stored as absent.
    pub async fn add(&self, title: Option<String>, content: String) -> Result<i64, ApiError> {
        if content.trim().is_empty() {
            return Err(ApiError::BadRequest("content is required".to_string()));
        }

        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let embedding =
            embed_one(self.provider.as_ref(), &content, &self.embedding_model).await?;

        let id = self
            .store
            .insert(NewDocument {
                title,
                content,
                embedding,
                embedding_model: self.embedding_model.clone(),
            })
            .await?;

        tracing::info!("Stored document {}", id);
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<DocumentPreview>, ApiError> {
        self.store.list(self.preview_chars).await
    }

    pub async fn all_with_embeddings(&self) -> Result<Vec<StoredDocument>, ApiError> {
        self.store.all_with_embeddings().await
    }

    pub async fn count(&self) -> Result<usize, ApiError> {
        self.store.count().await
    }
}
