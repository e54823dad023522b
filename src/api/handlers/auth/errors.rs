//! Auth error taxonomy and its HTTP mapping.
//!
//! Every variant renders as `{"detail": "<message>"}`; `401` responses also
//! carry `WWW-Authenticate: Bearer` so clients know to refresh or re-login.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token has been revoked")]
    RevokedToken,
    #[error("Invalid token type")]
    InvalidTokenType,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("User not found")]
    UserNotFound,
    #[error("User with this email already exists")]
    UserAlreadyExists,
    #[error("User account is inactive")]
    InactiveUser,
    #[error("Invalid or expired reset token")]
    InvalidResetToken,
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("{0}")]
    Captcha(String),
    #[error("Google OAuth is not configured")]
    OAuthNotConfigured,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn invalid_credentials() -> Self {
        Self::InvalidCredentials("Incorrect email or password".to_string())
    }

    pub fn invalid_token() -> Self {
        Self::InvalidToken("Invalid token".to_string())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidCredentials(_)
            | Self::InvalidToken(_)
            | Self::ExpiredToken
            | Self::RevokedToken
            | Self::InvalidTokenType
            | Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::UserAlreadyExists => StatusCode::CONFLICT,
            Self::InactiveUser | Self::InvalidResetToken | Self::Captcha(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::OAuthNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to clients; internal failures are never echoed back.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let Self::Internal(err) = &self {
            error!("Internal auth error: {err:#}");
        }

        let mut response = (status, Json(json!({ "detail": self.detail() }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            AuthError::invalid_credentials().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::UserAlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::InactiveUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::InvalidResetToken.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Validation("bad".to_string()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthError::RateLimited("5 per 1 minute".to_string()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn unauthorized_response_carries_bearer_challenge() {
        let response = AuthError::ExpiredToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }

    #[test]
    fn conflict_response_has_no_challenge() {
        let response = AuthError::UserAlreadyExists.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn internal_detail_is_generic() {
        let err = AuthError::from(anyhow!("connection refused"));
        assert_eq!(err.detail(), "Internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
