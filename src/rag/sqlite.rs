//! SQLite-backed document store.
//!
//! Rows hold the document text and its embedding serialized as JSON text.
//! Similarity search happens in process over `all_with_embeddings`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{DocumentPreview, DocumentStore, NewDocument, StoredDocument};
use crate::core::errors::ApiError;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteDocumentStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to open document db: {}", e)))?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                content TEXT NOT NULL,
                embedding TEXT NOT NULL,
                embedding_model TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init documents table: {}", e)))?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Result<String, ApiError> {
        serde_json::to_string(embedding).map_err(ApiError::internal)
    }

    fn deserialize_embedding(id: i64, raw: Option<&str>) -> Option<Vec<f32>> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty());
        let Some(raw) = raw else {
            tracing::warn!("Document {} has no stored embedding", id);
            return None;
        };
        match serde_json::from_str::<Vec<f32>>(raw) {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                tracing::warn!("Document {} has a malformed embedding: {}", id, err);
                None
            }
        }
    }

    fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => text[..byte_idx].to_string(),
            None => text.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, document: NewDocument) -> Result<i64, ApiError> {
        let embedding = Self::serialize_embedding(&document.embedding)?;
        let created_at = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let result = sqlx::query(
            "INSERT INTO documents (title, content, embedding, embedding_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&document.title)
        .bind(&document.content)
        .bind(&embedding)
        .bind(&document.embedding_model)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to insert document: {}", e)))?;

        Ok(result.last_insert_rowid())
    }

    async fn list(&self, preview_chars: usize) -> Result<Vec<DocumentPreview>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, title, content, created_at
             FROM documents
             ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let content: String = row.get("content");
                DocumentPreview {
                    id: row.get("id"),
                    title: row.get("title"),
                    snippet: Self::truncate_chars(&content, preview_chars),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }

    async fn all_with_embeddings(&self) -> Result<Vec<StoredDocument>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, title, content, embedding, embedding_model
             FROM documents
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let raw: Option<String> = row.get("embedding");
                StoredDocument {
                    id,
                    title: row.get("title"),
                    content: row.get("content"),
                    embedding: Self::deserialize_embedding(id, raw.as_deref()),
                    embedding_model: row.get("embedding_model"),
                }
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteDocumentStore {
        let tmp = std::env::temp_dir().join(format!(
            "ragchat-store-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        SqliteDocumentStore::with_path(tmp).await.unwrap()
    }

    fn make_doc(title: Option<&str>, content: &str, embedding: Vec<f32>) -> NewDocument {
        NewDocument {
            title: title.map(str::to_string),
            content: content.to_string(),
            embedding,
            embedding_model: "embed-v1".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = test_store().await;

        let first = store.insert(make_doc(Some("a"), "alpha", vec![1.0, 0.0])).await.unwrap();
        let second = store.insert(make_doc(None, "beta", vec![0.0, 1.0])).await.unwrap();

        assert!(second > first);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_truncated() {
        let store = test_store().await;

        store.insert(make_doc(Some("old"), "short", vec![1.0])).await.unwrap();
        let long = "é".repeat(1000);
        let newest = store.insert(make_doc(None, &long, vec![1.0])).await.unwrap();

        let listed = store.list(800).await.unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newest);
        assert_eq!(listed[0].title, None);
        assert_eq!(listed[0].snippet.chars().count(), 800);
        assert_eq!(listed[1].title.as_deref(), Some("old"));
        assert_eq!(listed[1].snippet, "short");
    }

    #[tokio::test]
    async fn list_follows_insertion_order_even_if_clock_steps_back() {
        let store = test_store().await;

        let first = store.insert(make_doc(Some("first"), "a", vec![1.0])).await.unwrap();
        sqlx::query(
            "INSERT INTO documents (title, content, embedding, embedding_model, created_at)
             VALUES ('second', 'b', '[1.0]', 'embed-v1', '2000-01-01T00:00:00.000000Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let listed = store.list(800).await.unwrap();

        assert_eq!(listed[0].title.as_deref(), Some("second"));
        assert_eq!(listed[1].id, first);
    }

    #[tokio::test]
    async fn all_with_embeddings_round_trips_in_storage_order() {
        let store = test_store().await;

        let a = store.insert(make_doc(Some("a"), "alpha", vec![0.25, -1.5])).await.unwrap();
        let b = store.insert(make_doc(Some("b"), "beta", vec![3.0, 4.0])).await.unwrap();

        let docs = store.all_with_embeddings().await.unwrap();

        assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(docs[0].embedding, Some(vec![0.25, -1.5]));
        assert_eq!(docs[0].content, "alpha");
        assert_eq!(docs[1].embedding_model.as_deref(), Some("embed-v1"));
    }

    #[tokio::test]
    async fn malformed_embeddings_surface_as_missing() {
        let store = test_store().await;

        store.insert(make_doc(Some("good"), "ok", vec![1.0])).await.unwrap();
        sqlx::query(
            "INSERT INTO documents (title, content, embedding, embedding_model, created_at)
             VALUES ('bad', 'broken', 'not-a-vector', NULL, '2024-01-01T00:00:00.000000Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let docs = store.all_with_embeddings().await.unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs[0].embedding.is_some());
        assert!(docs[1].embedding.is_none());
        assert!(docs[1].embedding_model.is_none());
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(SqliteDocumentStore::truncate_chars("héllo", 2), "hé");
        assert_eq!(SqliteDocumentStore::truncate_chars("hi", 10), "hi");
        assert_eq!(SqliteDocumentStore::truncate_chars("hi", 0), "");
    }
}
