use std::sync::Arc;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;
use crate::core::errors::ApiError;
use crate::llm::ChatMessage;
use super::utils::{json_payload, or_upstream};

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.settings.has_credential() {
        return Err(ApiError::Internal(
            "OPENAI_API_KEY is not configured on the server".to_string(),
        ));
    }

    let payload = json_payload(payload)?;
    let messages = parse_messages(&payload)?;
    let model = payload
        .get("model")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let reply = state
        .chat
        .respond(messages, model)
        .await
        .map_err(or_upstream("Chat request failed"))?;

    Ok(Json(json!({ "reply": reply })))
}

fn parse_messages(payload: &Value) -> Result<Vec<ChatMessage>, ApiError> {
    let items = payload
        .get("messages")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ApiError::BadRequest("messages must be an array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let role = item
                .get("role")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("messages[{}].role must be a string", index))
                })?;
            let content = match item.get("content") {
                None | Some(Value::Null) => "",
                Some(Value::String(content)) => content.as_str(),
                Some(_) => {
                    return Err(ApiError::BadRequest(format!(
                        "messages[{}].content must be a string",
                        index
                    )))
                }
            };
            Ok(ChatMessage::new(role, content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_tagged_messages() {
        let payload = json!({
            "messages": [
                { "role": "user", "content": "hi" },
                { "role": "assistant" }
            ]
        });
        let messages = parse_messages(&payload).unwrap();
        assert_eq!(messages, vec![ChatMessage::user("hi"), ChatMessage::assistant("")]);
    }

    #[test]
    fn rejects_missing_or_malformed_messages() {
        assert!(parse_messages(&json!({})).is_err());
        assert!(parse_messages(&json!({ "messages": "hello" })).is_err());
        assert!(parse_messages(&json!({ "messages": [{ "content": "no role" }] })).is_err());
        assert!(parse_messages(&json!({ "messages": [{ "role": "user", "content": 5 }] })).is_err());
    }
}
