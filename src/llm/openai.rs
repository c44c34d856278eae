use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::OpenAiSettings;
use crate::core::errors::ApiError;
use super::provider::LlmProvider;
use super::types::{ChatRequest, ModerationVerdict};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI-compatible HTTP provider covering chat, embeddings and moderation.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    moderation_model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ApiError::internal)?;

        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            moderation_model: settings.moderation_model.clone(),
            client,
        })
    }

    fn api_key(&self) -> Result<&str, ApiError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is not configured".to_string()))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.base_url, path);

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "OpenAI {} error ({}): {}",
                path,
                status,
                error_message(&text)
            )));
        }

        res.json().await.map_err(ApiError::internal)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        let payload = self.post_json("chat/completions", &body).await?;
        Ok(parse_chat_content(&payload))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let payload = self.post_json("embeddings", &body).await?;
        parse_embeddings(&payload)
    }

    async fn moderate(&self, input: &str) -> Result<ModerationVerdict, ApiError> {
        let body = json!({
            "model": self.moderation_model,
            "input": input,
        });

        let payload = self.post_json("moderations", &body).await?;
        parse_moderation(&payload)
    }
}

fn parse_chat_content(payload: &Value) -> String {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn parse_embeddings(payload: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| ApiError::Internal("Embedding response contained no data".to_string()))?;

    let mut items: Vec<(u64, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let values = item["embedding"].as_array().ok_or_else(|| {
            ApiError::Internal(format!("Embedding {} is missing its vector", position))
        })?;
        let vector = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| {
                ApiError::Internal(format!("Embedding {} contains a non-numeric value", position))
            })?;
        let index = item["index"].as_u64().unwrap_or(position as u64);
        items.push((index, vector));
    }

    if let Some((_, first)) = items.first() {
        let dims = first.len();
        if items.iter().any(|(_, vector)| vector.len() != dims) {
            return Err(ApiError::Internal(
                "Embedding response mixes vector dimensions".to_string(),
            ));
        }
    }

    items.sort_by_key(|(index, _)| *index);
    Ok(items.into_iter().map(|(_, vector)| vector).collect())
}

fn parse_moderation(payload: &Value) -> Result<ModerationVerdict, ApiError> {
    let result = payload["results"]
        .get(0)
        .ok_or_else(|| ApiError::Internal("Moderation response contained no results".to_string()))?;

    let flagged = result["flagged"].as_bool().unwrap_or(false);
    let categories = result["categories"]
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(_, hit)| hit.as_bool().unwrap_or(false))
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default();

    Ok(ModerationVerdict { flagged, categories })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[test]
    fn chat_content_defaults_to_empty() {
        let payload = json!({ "choices": [{ "message": { "role": "assistant", "content": "Hi!" } }] });
        assert_eq!(parse_chat_content(&payload), "Hi!");
        assert_eq!(parse_chat_content(&json!({ "choices": [] })), "");
        assert_eq!(parse_chat_content(&json!({})), "");
    }

    #[test]
    fn embeddings_follow_response_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.5, 0.5] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        assert_eq!(
            parse_embeddings(&payload).unwrap(),
            vec![vec![1.0, 0.0], vec![0.5, 0.5]]
        );
    }

    #[test]
    fn embeddings_with_non_numeric_values_are_rejected() {
        let payload = json!({ "data": [{ "index": 0, "embedding": [1.0, null] }] });
        assert!(parse_embeddings(&payload).is_err());

        let payload = json!({ "data": [{ "index": 0, "embedding": [0.5, "x", 0.5] }] });
        assert!(parse_embeddings(&payload).is_err());

        assert!(parse_embeddings(&json!({ "data": [{ "index": 0 }] })).is_err());
        assert!(parse_embeddings(&json!({})).is_err());
    }

    #[test]
    fn embeddings_with_mixed_dimensions_are_rejected() {
        let payload = json!({
            "data": [
                { "index": 0, "embedding": [1.0, 0.0, 0.0] },
                { "index": 1, "embedding": [1.0, 0.0] }
            ]
        });
        assert!(parse_embeddings(&payload).is_err());
    }

    #[test]
    fn moderation_collects_flagged_categories() {
        let payload = json!({
            "results": [{
                "flagged": true,
                "categories": { "violence": true, "harassment": false }
            }]
        });
        let verdict = parse_moderation(&payload).unwrap();
        assert!(verdict.flagged);
        assert_eq!(verdict.categories, vec!["violence".to_string()]);

        assert!(parse_moderation(&json!({ "results": [] })).is_err());
    }

    #[test]
    fn error_message_prefers_api_error_field() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn calls_fail_fast_without_credentials() {
        let provider = OpenAiProvider::new(&OpenAiSettings::default()).unwrap();
        let err = provider.moderate("hello").await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn silent_upstream_hits_the_request_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept connections and hold them open without ever answering
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let settings = OpenAiSettings {
            api_key: Some("sk-test".to_string()),
            base_url: format!("http://{}/v1", addr),
            request_timeout_secs: 1,
            ..OpenAiSettings::default()
        };
        let provider = OpenAiProvider::new(&settings).unwrap();

        let started = std::time::Instant::now();
        let result = provider
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")]), "gpt-test")
            .await;
        let elapsed = started.elapsed();

        assert!(result.is_err());
        assert!(elapsed >= Duration::from_millis(900), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "returned after {:?}", elapsed);

        server.abort();
    }
}
