use std::sync::Arc;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;
use crate::core::errors::ApiError;
use super::utils::{json_payload, or_upstream};

pub async fn create_document(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_payload(payload)?;

    let content = match payload.get("content") {
        Some(Value::String(content)) => content.clone(),
        _ => {
            return Err(ApiError::BadRequest(
                "content is required and must be a string".to_string(),
            ))
        }
    };
    let title = match payload.get("title") {
        None | Some(Value::Null) => None,
        Some(Value::String(title)) => Some(title.clone()),
        Some(_) => return Err(ApiError::BadRequest("title must be a string".to_string())),
    };

    let id = state
        .documents
        .add(title, content)
        .await
        .map_err(or_upstream("Failed to add document"))?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "id": id }))))
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state
        .documents
        .list()
        .await
        .map_err(or_upstream("Failed to list documents"))?;

    let data: Vec<Value> = documents
        .into_iter()
        .map(|doc| {
            json!({
                "id": doc.id,
                "title": doc.title,
                "snippet": doc.snippet,
                "created_at": doc.created_at
            })
        })
        .collect();

    Ok(Json(json!({ "data": data })))
}
