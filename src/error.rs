use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error from {source_name}: {message}")]
    Upstream { source_name: String, message: String },

    #[error("LLM API error ({status}): {body}")]
    LlmApi { status: u16, body: String },

    #[error("Empty completion from LLM")]
    EmptyCompletion,

    #[error("Malformed LLM completion: {0}")]
    MalformedCompletion(String),

    #[error("Normalization of {external_id} failed after {attempts} attempt(s): {reason}")]
    Normalization {
        external_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Source is paused: {0}")]
    SourcePaused(String),
}

impl AppError {
    /// Whether another LLM attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            AppError::LlmApi { status, .. } => *status == 429 || *status >= 500,
            AppError::EmptyCompletion | AppError::MalformedCompletion(_) | AppError::Json(_) => true,
            _ => false,
        }
    }

    pub fn upstream(source_name: &str, message: impl Into<String>) -> Self {
        AppError::Upstream {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_status_classification() {
        assert!(AppError::LlmApi { status: 429, body: String::new() }.is_retryable());
        assert!(AppError::LlmApi { status: 503, body: String::new() }.is_retryable());
        assert!(!AppError::LlmApi { status: 401, body: String::new() }.is_retryable());
    }

    #[test]
    fn completion_failures_are_retryable() {
        assert!(AppError::EmptyCompletion.is_retryable());
        assert!(AppError::MalformedCompletion("x".into()).is_retryable());
        assert!(!AppError::Config("missing key".into()).is_retryable());
    }
}
