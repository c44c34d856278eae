use std::future::Future;

use crate::core::errors::ApiError;

/// Runs an optional pipeline step, substituting `fallback` when it fails.
///
/// The failure is logged with the step name and never propagated.
pub async fn best_effort<T, F>(step: &str, fallback: T, operation: F) -> T
where
    F: Future<Output = Result<T, ApiError>>,
{
    match operation.await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("{} step failed, continuing without it: {}", step, err);
            fallback
        }
    }
}
