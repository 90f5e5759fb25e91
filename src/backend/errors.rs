use thiserror::Error;

/// Failures talking to the clipboard backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, reset, ...
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-2xx HTTP status
    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    /// 2xx response whose `status` field is not "success"
    #[error("Request rejected by server: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),
}

impl BackendError {
    /// Whether the same request could succeed on a later cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Network(_) | BackendError::Timeout(_) => true,
            BackendError::Api { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else if err.is_builder() {
            BackendError::Endpoint(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}
