use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::Value;

use crate::core::errors::ApiError;

/// Unwraps a JSON body, reporting malformed input as a client error with the
/// standard `{error}` body instead of axum's plain-text rejection.
pub fn json_payload(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match payload {
        Ok(Json(value)) if value.is_object() => Ok(value),
        Ok(_) => Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}

/// Keeps client and already-wrapped errors, wraps everything else with
/// `message` so the response carries `{error, details}`.
pub fn or_upstream(message: &'static str) -> impl Fn(ApiError) -> ApiError {
    move |err| {
        if err.is_client_error() || matches!(err, ApiError::Upstream { .. }) {
            err
        } else {
            ApiError::upstream(message, err)
        }
    }
}
