use reqwest::{header::InvalidHeaderValue, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid base URL: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request failed ({status}): {message}")]
    Http { status: StatusCode, message: String },
    #[error("Token storage error: {0}")]
    Storage(String),
    #[error("No refresh token stored")]
    MissingRefreshToken,
    #[error("Stored access token is not a valid header value")]
    InvalidToken(#[from] InvalidHeaderValue),
    #[error("Session expired, sign in again at {login_path}")]
    SessionExpired { login_path: String },
    #[error("Token refresh was cancelled")]
    Cancelled,
}

impl ClientError {
    /// HTTP status of a rejected request, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(err) => err.status(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
