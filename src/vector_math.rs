use std::cmp::Ordering;

use crate::core::errors::ApiError;

/// Cosine similarity in `[-1, 1]`.
///
/// A vector with zero magnitude has no direction, so any comparison against
/// it scores `0.0`. Only a length mismatch is an error.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, ApiError> {
    if query.len() != candidate.len() {
        return Err(ApiError::BadRequest(format!(
            "Vector length mismatch: {} != {}",
            query.len(),
            candidate.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut query_sq = 0.0f64;
    let mut candidate_sq = 0.0f64;
    for (q, c) in query.iter().zip(candidate) {
        let (q, c) = (*q as f64, *c as f64);
        dot += q * c;
        query_sq += q * q;
        candidate_sq += c * c;
    }

    // squares of nonzero f32 values never underflow in f64
    if query_sq == 0.0 || candidate_sq == 0.0 {
        return Ok(0.0);
    }

    let denom = query_sq.sqrt() * candidate_sq.sqrt();
    Ok((dot / denom).clamp(-1.0, 1.0) as f32)
}

/// Brute-force top-k over `(item, vector)` candidates.
///
/// Results are sorted by descending score; equal scores keep the order in
/// which candidates were supplied. Only scores strictly above `threshold`
/// survive. Candidates that cannot be scored are logged and skipped.
pub fn rank_top_k<'a, T, I>(query: &[f32], candidates: I, limit: usize, threshold: f32) -> Vec<(T, f32)>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
    T: std::fmt::Debug,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .filter_map(|(item, vector)| match cosine_similarity(query, vector) {
            Ok(score) if score.is_finite() => Some((item, score)),
            Ok(score) => {
                tracing::warn!("Skipping candidate {:?}: non-finite score {}", item, score);
                None
            }
            Err(err) => {
                tracing::warn!("Skipping candidate {:?}: {}", item, err);
                None
            }
        })
        .filter(|(_, score)| *score > threshold)
        .collect();

    // sort_by is stable, which keeps storage order for ties
    scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}
