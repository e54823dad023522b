//! reCAPTCHA v3 verification for public auth endpoints.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{future::Future, pin::Pin};
use tracing::{debug, error, warn};

use super::errors::AuthError;

pub const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_RECAPTCHA_MIN_SCORE: f64 = 0.5;

pub type CaptchaFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>>;

pub trait CaptchaVerifier: Send + Sync {
    /// Verify `token` for `action`; a missing token fails when verification
    /// is enabled.
    fn verify<'a>(&'a self, token: Option<&'a str>, action: &'a str) -> CaptchaFuture<'a>;
}

/// Used when no reCAPTCHA secret is configured.
#[derive(Clone, Debug)]
pub struct DisabledCaptcha;

impl CaptchaVerifier for DisabledCaptcha {
    fn verify<'a>(&'a self, _token: Option<&'a str>, _action: &'a str) -> CaptchaFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[derive(Debug)]
pub struct RecaptchaVerifier {
    client: Client,
    secret: SecretString,
    verify_url: String,
    min_score: f64,
}

impl RecaptchaVerifier {
    #[must_use]
    pub fn new(client: Client, secret: SecretString, verify_url: String, min_score: f64) -> Self {
        Self {
            client,
            secret,
            verify_url,
            min_score,
        }
    }

    async fn verify_token(&self, token: Option<&str>, action: &str) -> Result<(), AuthError> {
        let Some(token) = token.filter(|token| !token.trim().is_empty()) else {
            return Err(AuthError::Captcha("reCAPTCHA token is required".to_string()));
        };

        let failed = || AuthError::Captcha("reCAPTCHA verification failed".to_string());

        let response = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", self.secret.expose_secret()), ("response", token)])
            .send()
            .await
            .map_err(|err| {
                error!("reCAPTCHA request failed: {err}");
                failed()
            })?;

        let body: SiteVerifyResponse = response.json().await.map_err(|err| {
            error!("reCAPTCHA response could not be decoded: {err}");
            failed()
        })?;

        if !body.success {
            debug!("reCAPTCHA rejected token: {:?}", body.error_codes);
            return Err(failed());
        }

        if let Some(reported) = body.action.as_deref() {
            if reported != action {
                warn!("reCAPTCHA action mismatch: expected {action}, got {reported}");
                return Err(failed());
            }
        }

        if let Some(score) = body.score {
            if score < self.min_score {
                debug!("reCAPTCHA score {score} below {}", self.min_score);
                return Err(failed());
            }
        }

        Ok(())
    }
}

impl CaptchaVerifier for RecaptchaVerifier {
    fn verify<'a>(&'a self, token: Option<&'a str>, action: &'a str) -> CaptchaFuture<'a> {
        Box::pin(self.verify_token(token, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn spawn_siteverify(reply: Value) -> String {
        let app = Router::new().route(
            "/siteverify",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let reply = reply.clone();
                async move {
                    assert_eq!(form.get("secret").map(String::as_str), Some("secret"));
                    Json(reply)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/siteverify")
    }

    fn verifier(url: String) -> RecaptchaVerifier {
        RecaptchaVerifier::new(
            Client::new(),
            SecretString::from("secret"),
            url,
            DEFAULT_RECAPTCHA_MIN_SCORE,
        )
    }

    #[tokio::test]
    async fn disabled_captcha_accepts_anything() {
        assert!(DisabledCaptcha.verify(None, "login").await.is_ok());
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let verifier = verifier("http://127.0.0.1:9/unused".to_string());
        let err = verifier.verify(None, "login").await.unwrap_err();
        assert_eq!(err.to_string(), "reCAPTCHA token is required");
    }

    #[tokio::test]
    async fn successful_verification_passes() {
        let url = spawn_siteverify(json!({"success": true, "score": 0.9, "action": "login"})).await;
        assert!(verifier(url).verify(Some("tok"), "login").await.is_ok());
    }

    #[tokio::test]
    async fn low_score_or_wrong_action_fails() {
        let url = spawn_siteverify(json!({"success": true, "score": 0.1, "action": "login"})).await;
        let err = verifier(url).verify(Some("tok"), "login").await.unwrap_err();
        assert_eq!(err.to_string(), "reCAPTCHA verification failed");

        let url =
            spawn_siteverify(json!({"success": true, "score": 0.9, "action": "register"})).await;
        assert!(verifier(url).verify(Some("tok"), "login").await.is_err());
    }

    #[tokio::test]
    async fn unsuccessful_response_fails() {
        let url =
            spawn_siteverify(json!({"success": false, "error-codes": ["invalid-input-response"]}))
                .await;
        assert!(verifier(url).verify(Some("tok"), "register").await.is_err());
    }
}
