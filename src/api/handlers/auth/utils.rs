//! Small helpers for auth input validation and token handling.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

use super::errors::AuthError;

const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 100;
const NAME_MAX_CHARS: usize = 100;
const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn validate_email(email_normalized: &str) -> Result<(), AuthError> {
    if valid_email(email_normalized) {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "email: value is not a valid email address".to_string(),
        ))
    }
}

/// Check a character-count range, reporting failures against `field`.
pub(crate) fn validate_length(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), AuthError> {
    let len = value.chars().count();
    if len < min {
        return Err(AuthError::Validation(format!(
            "{field}: should have at least {min} characters"
        )));
    }
    if len > max {
        return Err(AuthError::Validation(format!(
            "{field}: should have at most {max} characters"
        )));
    }
    Ok(())
}

/// Length rules applied to passwords presented at login.
pub(crate) fn validate_login_password(password: &str) -> Result<(), AuthError> {
    validate_length("password", password, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)
}

/// Length and character-class rules applied to every newly chosen password.
pub(crate) fn validate_new_password(field: &str, password: &str) -> Result<(), AuthError> {
    validate_length(field, password, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)?;

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::Validation(format!(
            "{field}: Password must contain at least one uppercase letter"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AuthError::Validation(format!(
            "{field}: Password must contain at least one lowercase letter"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation(format!(
            "{field}: Password must contain at least one digit"
        )));
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(AuthError::Validation(format!(
            "{field}: Password must contain at least one special character ({SPECIAL_CHARACTERS})"
        )));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<(), AuthError> {
    validate_length("name", name, 1, NAME_MAX_CHARS)
}

/// Hash a one-time token so the raw value never touches storage.
pub(crate) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Random URL-safe value, used for OAuth `state` and throwaway passwords.
pub(crate) fn generate_random_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Build the frontend password reset link.
pub(crate) fn build_reset_url(frontend_url: &str, token: &str) -> String {
    let base = frontend_url.trim_end_matches('/');
    format!("{base}/reset-password/{token}")
}

/// Extract a client IP for rate limiting from common proxy headers, falling
/// back to the socket peer.
pub(crate) fn extract_client_ip(
    headers: &axum::http::HeaderMap,
    peer: Option<SocketAddr>,
) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn new_password_rules_report_first_failure() {
        let cases = [
            ("Ab1!", "at least 8 characters"),
            ("lowercase1!", "uppercase letter"),
            ("UPPERCASE1!", "lowercase letter"),
            ("NoDigits!!", "digit"),
            ("NoSpecial12", "special character"),
        ];
        for (password, expected) in cases {
            let err = validate_new_password("password", password)
                .err()
                .map(|err| err.to_string())
                .unwrap_or_default();
            assert!(
                err.contains(expected),
                "{password}: expected '{expected}' in '{err}'"
            );
        }
        assert!(validate_new_password("password", "Str0ng!Pass").is_ok());
    }

    #[test]
    fn new_password_rejects_over_long_input() {
        let password = format!("Aa1!{}", "x".repeat(100));
        assert!(validate_new_password("newPassword", &password).is_err());
    }

    #[test]
    fn login_password_only_checks_length() {
        assert!(validate_login_password("alllowercase").is_ok());
        assert!(validate_login_password("short").is_err());
    }

    #[test]
    fn name_must_not_be_empty() {
        assert!(validate_name("").is_err());
        assert!(validate_name("Alice").is_ok());
    }

    #[test]
    fn hash_token_stable() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn random_tokens_differ() {
        let first = generate_random_token().unwrap_or_default();
        let second = generate_random_token().unwrap_or_default();
        assert_eq!(first.len(), 43);
        assert_ne!(first, second);
    }

    #[test]
    fn build_reset_url_trims_trailing_slash() {
        let url = build_reset_url("http://localhost:3000/", "abc");
        assert_eq!(url, "http://localhost:3000/reset-password/abc");
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn extract_client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: Option<SocketAddr> = "10.0.0.7:5555".parse().ok();
        assert_eq!(
            extract_client_ip(&headers, peer),
            Some("10.0.0.7".to_string())
        );
        assert_eq!(extract_client_ip(&headers, None), None);
    }
}
