//! Formats retrieved documents into a delimited block for the system prompt.

use super::store::{ScoredDocument, StoredDocument};

const UNTITLED: &str = "untitled";

fn display_title(document: &StoredDocument) -> &str {
    document
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
}

/// Renders one block per match, in rank order.
///
/// Each block carries the document number, title (or `untitled`), the score
/// rounded to three decimals and the full content between explicit
/// begin/end markers. Returns an empty string when there are no matches.
pub fn format_context(matches: &[ScoredDocument]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, sc)| {
            format!(
                "[{n}] {title} (score: {score:.3})\n<<<BEGIN DOCUMENT {n}>>>\n{content}\n<<<END DOCUMENT {n}>>>",
                n = i + 1,
                title = display_title(&sc.document),
                score = sc.score,
                content = sc.document.content,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Bracketed labels (`[1] title`) for the documents in a context block.
pub fn source_labels(matches: &[ScoredDocument]) -> Vec<String> {
    matches
        .iter()
        .enumerate()
        .map(|(i, sc)| format!("[{}] {}", i + 1, display_title(&sc.document)))
        .collect()
}
