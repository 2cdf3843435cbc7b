use std::io;

/// Custom error type for gitlab_jenkins_relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request to {url} failed with HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("Authentication rejected by {0}")]
    AuthenticationFailed(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

impl RelayError {
    /// True for the "resource does not exist" class of failures (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, RelayError::NotFound(_))
    }
}

/// Helper type for Results that use RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
