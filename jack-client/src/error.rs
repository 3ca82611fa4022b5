//! Error types for the Jack client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the build server
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never got an answer (connection, TLS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Server answered {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A job, build or page that does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rejected locally, nothing was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match message.trim() {
            "" => "no response body".to_string(),
            trimmed => trimmed.to_string(),
        };
        Self::ApiError { status, message }
    }

    /// HTTP status behind the error, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            Self::ParseError(_) | Self::InvalidRequest(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// 4xx: retrying the same request will not help
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// 5xx: the server is up but unwell, typically restarting
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}
