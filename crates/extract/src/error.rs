use thiserror::Error;

/// Failures of a generate / verify / optimize call. None of them are retried.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// Required credential missing; raised before any network call.
    #[error("{0}")]
    Config(String),

    /// The chat-completion call failed or came back empty.
    #[error("AI request failed: {0}")]
    Llm(String),

    /// Model output was not valid JSON, or a node did not match the schema.
    #[error("{0}")]
    Schema(String),
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Llm(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
