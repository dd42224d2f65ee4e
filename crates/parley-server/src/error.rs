use axum::{http::StatusCode, response::IntoResponse, Json};
use parley::errors::ChatError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted configuration key
pub fn to_env_var(field_path: &str) -> String {
    format!("PARLEY_{}", field_path.to_uppercase().replace('.', "__"))
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown chat profile: {0}")]
    UnknownProfile(String),
    #[error("Unknown chat session: {0}")]
    NotFound(String),
    #[error("Attachment is not an upload: {0}")]
    ForbiddenPath(String),
    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            SessionError::UnknownProfile(_) => StatusCode::BAD_REQUEST,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::ForbiddenPath(_) => StatusCode::FORBIDDEN,
            SessionError::Chat(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
