use std::sync::Arc;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let documents = match state.documents.count().await {
        Ok(count) => json!(count),
        Err(err) => {
            tracing::warn!("Health check could not count documents: {}", err);
            json!(null)
        }
    };

    Json(json!({
        "status": "ok",
        "documents": documents,
        "credential_configured": state.settings.has_credential()
    }))
}
