use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use super::fallback::best_effort;
use super::prompt::compose_system_prompt;
use crate::core::config::{CompletionSettings, RetrievalSettings};
use crate::core::errors::ApiError;
use crate::llm::types::{ROLE_SYSTEM, ROLE_USER};
use crate::llm::{embed_one, ChatMessage, ChatRequest, LlmProvider, ModerationVerdict};
use crate::rag::context_builder::source_labels;
use crate::rag::{DocumentLibrary, ScoredDocument};
use crate::vector_math::rank_top_k;

/// Turns one caller-supplied conversation into one model reply.
///
/// Steps run in a fixed order: validation, moderation, retrieval, prompt
/// composition, message assembly, model call. Moderation and retrieval are
/// best-effort; only validation, a moderation flag and the model call itself
/// can fail the request.
#[derive(Clone)]
pub struct ChatPipeline {
    provider: Arc<dyn LlmProvider>,
    library: DocumentLibrary,
    default_model: String,
    retrieval: RetrievalSettings,
    completion: CompletionSettings,
}

impl ChatPipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        library: DocumentLibrary,
        default_model: impl Into<String>,
        retrieval: RetrievalSettings,
        completion: CompletionSettings,
    ) -> Self {
        Self {
            provider,
            library,
            default_model: default_model.into(),
            retrieval,
            completion,
        }
    }

    pub async fn respond(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<String>,
    ) -> Result<String, ApiError> {
        let span = tracing::info_span!("chat", request_id = %Uuid::new_v4());
        self.run(messages, model).instrument(span).await
    }

    async fn run(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<String>,
    ) -> Result<String, ApiError> {
        validate_conversation(&messages)?;

        let user_content = latest_user_content(&messages).to_string();
        let has_content = !user_content.trim().is_empty();

        if has_content {
            let verdict = best_effort(
                "moderation",
                ModerationVerdict::allowed(),
                self.provider.moderate(&user_content),
            )
            .await;
            if verdict.flagged {
                tracing::warn!("Message flagged by moderation: {:?}", verdict.categories);
                return Err(ApiError::Forbidden(
                    "Message was flagged by content moderation".to_string(),
                ));
            }
        }

        let matches = if has_content {
            best_effort("retrieval", Vec::new(), self.retrieve(&user_content)).await
        } else {
            Vec::new()
        };
        if !matches.is_empty() {
            tracing::info!("Injecting context from {}", source_labels(&matches).join(", "));
        }

        let conversation = assemble_messages(compose_system_prompt(&matches), messages);
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone());

        let request = ChatRequest::new(conversation)
            .with_sampling(self.completion.temperature, self.completion.max_tokens);

        let reply = self
            .provider
            .chat(request, &model)
            .await
            .map_err(|e| ApiError::upstream("Chat completion failed", e))?;

        tracing::info!("Completed chat with {} ({} chars)", model, reply.chars().count());
        Ok(reply)
    }

    /// Embeds the query and ranks every stored document against it.
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredDocument>, ApiError> {
        let embedding_model = self.library.embedding_model();
        let query_vector = embed_one(self.provider.as_ref(), query, embedding_model).await?;
        let documents = self.library.all_with_embeddings().await?;

        let candidates = documents.iter().filter_map(|doc| {
            if let Some(tag) = doc.embedding_model.as_deref() {
                if tag != embedding_model {
                    tracing::warn!(
                        "Skipping document {}: embedded with {} but querying with {}",
                        doc.id,
                        tag,
                        embedding_model
                    );
                    return None;
                }
            }
            doc.embedding.as_deref().map(|vector| (doc.id, vector))
        });

        let ranked = rank_top_k(
            &query_vector,
            candidates,
            self.retrieval.top_k,
            self.retrieval.min_score,
        );

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                documents
                    .iter()
                    .find(|doc| doc.id == id)
                    .map(|doc| ScoredDocument {
                        document: doc.clone(),
                        score,
                    })
            })
            .collect())
    }
}

fn validate_conversation(messages: &[ChatMessage]) -> Result<(), ApiError> {
    if messages.is_empty() {
        return Err(ApiError::BadRequest(
            "messages must be a non-empty array".to_string(),
        ));
    }
    if let Some(bad) = messages.iter().find(|m| !m.is_known_role()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported message role: {}",
            bad.role
        )));
    }
    Ok(())
}

fn latest_user_content(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ROLE_USER)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// Replaces caller-supplied system messages with `system_prompt`, keeping
/// the rest of the conversation in order.
fn assemble_messages(system_prompt: String, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut assembled = Vec::with_capacity(messages.len() + 1);
    assembled.push(ChatMessage::system(system_prompt));
    assembled.extend(messages.into_iter().filter(|m| m.role != ROLE_SYSTEM));
    assembled
}
