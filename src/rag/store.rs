//! DocumentStore trait: abstract persistence for the knowledge base.
//!
//! The primary implementation is `SqliteDocumentStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// A document ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: Option<String>,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Embedding model that produced `embedding`.
    pub embedding_model: String,
}

/// Listing view of a document; never carries the embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPreview {
    pub id: i64,
    pub title: Option<String>,
    pub snippet: String,
    pub created_at: String,
}

/// Full stored row used for retrieval.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: i64,
    pub title: Option<String>,
    pub content: String,
    /// `None` when the stored vector is missing or unreadable.
    pub embedding: Option<Vec<f32>>,
    /// `None` for rows written before model tagging.
    pub embedding_model: Option<String>,
}

/// A stored document with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: StoredDocument,
    pub score: f32,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a document atomically, returning its new identifier.
    async fn insert(&self, document: NewDocument) -> Result<i64, ApiError>;

    /// All documents, newest first, with content cut to `preview_chars` characters.
    async fn list(&self, preview_chars: usize) -> Result<Vec<DocumentPreview>, ApiError>;

    /// All documents with their embeddings, in storage order.
    async fn all_with_embeddings(&self) -> Result<Vec<StoredDocument>, ApiError>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize, ApiError>;
}
