use thiserror::Error;

/// Failure reported by the live transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unauthorized (401)")]
    Unauthorized,
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Transient failures worth another attempt. Client errors never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Unauthorized | TransportError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                TransportError::Unauthorized
            } else {
                TransportError::Status { status: status.as_u16(), body: String::new() }
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to {operation}: {source}")]
    TransportFailure {
        operation: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("authentication failed: {0}")]
    AuthenticationRejected(String),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ApiError::NotFound { kind, name: name.into() }
    }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
