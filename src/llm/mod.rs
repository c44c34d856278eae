pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::{embed_one, LlmProvider};
pub use types::{ChatMessage, ChatRequest, ModerationVerdict};
