//! Request/response types for auth endpoints.
//!
//! Field names are camelCase on the wire. The client module reuses these types
//! so both sides agree on the JSON shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const TOKEN_TYPE_BEARER: &str = "bearer";

fn bearer() -> String {
    TOKEN_TYPE_BEARER.to_string()
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRegister {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recaptcha_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserLogin {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recaptcha_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefresh {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// ULID of the user.
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub tier: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub expires_in: i64,
}

impl LoginResponse {
    #[must_use]
    pub fn tokens(&self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            token_type: self.token_type.clone(),
            expires_in: self.expires_in,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recaptcha_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Error body returned by every failing auth endpoint.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use serde_json::json;

    #[test]
    fn register_request_uses_camel_case() -> Result<()> {
        let request: UserRegister = serde_json::from_value(json!({
            "email": "alice@example.com",
            "password": "Secret123!",
            "name": "Alice",
            "recaptchaToken": "captcha"
        }))?;
        assert_eq!(request.recaptcha_token.as_deref(), Some("captcha"));

        let value = serde_json::to_value(&request)?;
        let token = value
            .get("recaptchaToken")
            .and_then(serde_json::Value::as_str)
            .context("missing recaptchaToken")?;
        assert_eq!(token, "captcha");
        Ok(())
    }

    #[test]
    fn token_response_defaults_token_type() -> Result<()> {
        let response: TokenResponse = serde_json::from_value(json!({
            "accessToken": "a",
            "refreshToken": "r",
            "expiresIn": 1800
        }))?;
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 1800);
        Ok(())
    }

    #[test]
    fn login_response_exposes_token_pair() {
        let login = LoginResponse {
            user: UserResponse {
                id: "01HZX3J9Q8W6V5T4S3R2P1N0MK".to_string(),
                email: "alice@example.com".to_string(),
                name: "Alice".to_string(),
                is_active: true,
                created_at: Utc::now(),
                tier: "free".to_string(),
            },
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: bearer(),
            expires_in: 60,
        };
        let tokens = login.tokens();
        assert_eq!(tokens.access_token, "access");
        assert_eq!(tokens.refresh_token, "refresh");
    }
}
