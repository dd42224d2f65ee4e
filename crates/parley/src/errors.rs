use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while adapting, generating or rendering a response.
///
/// The kind is kept until the error reaches the display surface, where it
/// is flattened to its message for the user.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ChatError {
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Completion failed: {0}")]
    Engine(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Display update failed: {0}")]
    Display(String),

    #[error("Response cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Engine(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
