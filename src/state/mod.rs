use std::sync::Arc;

use crate::chat::ChatPipeline;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{DocumentLibrary, DocumentStore, SqliteDocumentStore};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Every dependency is constructed here and handed to the pieces that need
/// it, so tests can assemble the same state around fakes with
/// [`AppState::from_parts`].
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub documents: DocumentLibrary,
    pub chat: ChatPipeline,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Loads and validates configuration
    /// 2. Enforces the credential policy for the current environment
    /// 3. Opens the document store
    /// 4. Builds the OpenAI provider and the chat pipeline
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        if let Ok(effective) = config.load_config() {
            tracing::debug!(
                "Effective configuration: {}",
                config.redact_sensitive_values(&effective)
            );
        }

        if !settings.has_credential() {
            let environment = settings.app.environment;
            if environment.requires_credential() {
                return Err(InitializationError::MissingCredential(
                    format!("{:?}", environment).to_lowercase(),
                ));
            }
            tracing::warn!(
                "OPENAI_API_KEY is not set; /chat and document uploads will fail until it is configured"
            );
        }

        let db_path = settings
            .app
            .database_path
            .clone()
            .unwrap_or_else(|| paths.db_path.clone());
        let store = SqliteDocumentStore::with_path(db_path)
            .await
            .map_err(|e| InitializationError::DocumentStore(e.into()))?;
        tracing::info!("Document store at {}", store.db_path().display());

        let provider = OpenAiProvider::new(&settings.openai)
            .map_err(|e| InitializationError::Llm(e.into()))?;

        Ok(Arc::new(Self::from_parts(
            settings,
            Arc::new(store),
            Arc::new(provider),
        )))
    }

    pub fn from_parts(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        let documents = DocumentLibrary::new(
            store,
            provider.clone(),
            settings.openai.embedding_model.clone(),
            settings.retrieval.preview_chars,
        );
        let chat = ChatPipeline::new(
            provider,
            documents.clone(),
            settings.openai.default_model.clone(),
            settings.retrieval.clone(),
            settings.completion.clone(),
        );

        AppState {
            settings: Arc::new(settings),
            documents,
            chat,
        }
    }
}
