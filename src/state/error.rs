use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("OPENAI_API_KEY is required when running in {0} mode")]
    MissingCredential(String),

    #[error("Failed to initialize document store: {0}")]
    DocumentStore(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),
}
