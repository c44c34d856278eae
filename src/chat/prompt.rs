use crate::rag::context_builder::format_context;
use crate::rag::ScoredDocument;

pub const BASE_SYSTEM_PROMPT: &str = "\
You are a helpful, careful assistant.
- If a request is ambiguous or missing information, ask a clarifying question before answering.
- Show your reasoning briefly when working through a problem.
- Say so plainly when you are unsure or do not know; do not invent facts.
- Cite your sources whenever you rely on them.";

const CONTEXT_PREAMBLE: &str = "\
The following documents from the knowledge base may be relevant to the user's latest message. \
Each one is delimited by BEGIN/END markers. When you use information from a document, cite it \
by its bracketed number and title, e.g. [1] Title.";

/// System prompt for one request: the base instructions, plus the retrieved
/// documents when there are any.
pub fn compose_system_prompt(matches: &[ScoredDocument]) -> String {
    if matches.is_empty() {
        return BASE_SYSTEM_PROMPT.to_string();
    }

    format!(
        "{}\n\n{}\n\n{}",
        BASE_SYSTEM_PROMPT,
        CONTEXT_PREAMBLE,
        format_context(matches)
    )
}
