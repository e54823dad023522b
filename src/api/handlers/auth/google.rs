//! Google OAuth 2.0 sign-in (authorization code flow).
//!
//! `/google/login` stores a one-time `state` and redirects to the consent
//! screen; `/google/callback` checks the state, exchanges the code and reads
//! the userinfo endpoint. Pending states expire after ten minutes.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error};
use url::Url;

use super::{errors::AuthError, utils::generate_random_token};

pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const OAUTH_SCOPE: &str = "openid email profile";
const STATE_TTL: Duration = Duration::from_secs(10 * 60);
const MAX_PENDING_STATES: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("invalid_state")]
    InvalidState,
    #[error("{0}")]
    Provider(String),
    #[error("missing_code")]
    MissingCode,
    #[error("token_exchange_failed")]
    TokenExchange,
    #[error("userinfo_failed")]
    UserInfo,
    #[error("Incomplete user information from Google")]
    Incomplete,
}

impl From<GoogleAuthError> for AuthError {
    fn from(err: GoogleAuthError) -> Self {
        match err {
            GoogleAuthError::Incomplete => Self::InvalidCredentials(err.to_string()),
            other => Self::InvalidCredentials(format!("Google authentication failed: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GoogleOAuthConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleOAuthConfig {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
            auth_url: DEFAULT_GOOGLE_AUTH_URL.to_string(),
            token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: DEFAULT_GOOGLE_USERINFO_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: String) -> Self {
        self.auth_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: String) -> Self {
        self.userinfo_url = url;
        self
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Verified identity returned by a completed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    client: Client,
    states: Mutex<HashMap<String, Instant>>,
    state_ttl: Duration,
    max_states: usize,
}

impl GoogleOAuth {
    #[must_use]
    pub fn new(config: GoogleOAuthConfig, client: Client) -> Self {
        Self {
            config,
            client,
            states: Mutex::new(HashMap::new()),
            state_ttl: STATE_TTL,
            max_states: MAX_PENDING_STATES,
        }
    }

    /// Consent screen URL carrying a freshly stored `state`.
    pub fn authorization_url(&self) -> Result<Url> {
        let state = generate_random_token()?;
        {
            let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
            states.retain(|_, created| created.elapsed() < self.state_ttl);
            // At capacity the oldest pending sign-in is dropped.
            if states.len() >= self.max_states {
                let oldest = states
                    .iter()
                    .min_by_key(|(_, created)| **created)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    states.remove(&oldest);
                }
            }
            states.insert(state.clone(), Instant::now());
        }

        Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("scope", OAUTH_SCOPE),
                ("state", state.as_str()),
                ("prompt", "select_account"),
            ],
        )
        .with_context(|| format!("invalid Google auth URL: {}", self.config.auth_url))
    }

    /// States are single use; an expired or unknown state is rejected.
    fn take_state(&self, state: &str) -> bool {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .remove(state)
            .is_some_and(|created| created.elapsed() < self.state_ttl)
    }

    /// Validate the callback parameters and resolve the Google identity.
    pub async fn complete(
        &self,
        callback: &GoogleCallback,
    ) -> Result<GoogleIdentity, GoogleAuthError> {
        let state_ok = callback
            .state
            .as_deref()
            .is_some_and(|state| self.take_state(state));
        if !state_ok {
            return Err(GoogleAuthError::InvalidState);
        }

        if let Some(error) = callback.error.as_deref() {
            return Err(GoogleAuthError::Provider(error.to_string()));
        }

        let code = callback
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(GoogleAuthError::MissingCode)?;

        let access_token = self.exchange_code(code).await?;
        let info = self.fetch_userinfo(&access_token).await?;

        match (info.email, info.sub) {
            (Some(email), Some(google_id)) if !email.is_empty() && !google_id.is_empty() => {
                Ok(GoogleIdentity {
                    google_id,
                    email,
                    name: info.name.unwrap_or_default(),
                })
            }
            _ => Err(GoogleAuthError::Incomplete),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<String, GoogleAuthError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|err| {
                error!("Google token exchange request failed: {err}");
                GoogleAuthError::TokenExchange
            })?;

        if !response.status().is_success() {
            debug!("Google token endpoint returned {}", response.status());
            return Err(GoogleAuthError::TokenExchange);
        }

        response
            .json::<TokenExchangeResponse>()
            .await
            .map(|body| body.access_token)
            .map_err(|err| {
                error!("Google token response could not be decoded: {err}");
                GoogleAuthError::TokenExchange
            })
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleUserInfo, GoogleAuthError> {
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| {
                error!("Google userinfo request failed: {err}");
                GoogleAuthError::UserInfo
            })?;

        if !response.status().is_success() {
            debug!("Google userinfo endpoint returned {}", response.status());
            return Err(GoogleAuthError::UserInfo);
        }

        response.json::<GoogleUserInfo>().await.map_err(|err| {
            error!("Google userinfo response could not be decoded: {err}");
            GoogleAuthError::UserInfo
        })
    }
}

/// Query parameters Google appends to the redirect URL.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GoogleCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_provider(userinfo: serde_json::Value) -> String {
        let app = Router::new()
            .route(
                "/token",
                post(|| async { Json(json!({"access_token": "google-access"})) }),
            )
            .route(
                "/userinfo",
                get(move || {
                    let userinfo = userinfo.clone();
                    async move { Json(userinfo) }
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn oauth(base: &str) -> GoogleOAuth {
        let config = GoogleOAuthConfig::new(
            "client-id".to_string(),
            SecretString::from("client-secret"),
            "http://localhost:8080/api/v1/auth/google/callback".to_string(),
        )
        .with_token_url(format!("{base}/token"))
        .with_userinfo_url(format!("{base}/userinfo"));
        GoogleOAuth::new(config, Client::new())
    }

    fn state_from(url: &Url) -> String {
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[test]
    fn authorization_url_carries_client_and_state() {
        let oauth = oauth("http://127.0.0.1:9");
        let url = oauth.authorization_url().unwrap();
        assert!(url.as_str().starts_with(DEFAULT_GOOGLE_AUTH_URL));
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("scope").map(String::as_str), Some(OAUTH_SCOPE));
        assert!(oauth.take_state(&state_from(&url)));
    }

    #[test]
    fn states_are_single_use() {
        let oauth = oauth("http://127.0.0.1:9");
        let state = state_from(&oauth.authorization_url().unwrap());
        assert!(oauth.take_state(&state));
        assert!(!oauth.take_state(&state));
        assert!(!oauth.take_state("unknown"));
    }

    #[test]
    fn pending_states_are_capped() {
        let mut oauth = oauth("http://127.0.0.1:9");
        oauth.max_states = 3;
        let first = state_from(&oauth.authorization_url().unwrap());
        std::thread::sleep(Duration::from_millis(2));
        let rest: Vec<String> = (0..3)
            .map(|_| state_from(&oauth.authorization_url().unwrap()))
            .collect();

        assert_eq!(oauth.states.lock().unwrap().len(), 3);
        assert!(!oauth.take_state(&first));
        for state in &rest {
            assert!(oauth.take_state(state));
        }
    }

    #[tokio::test]
    async fn callback_resolves_identity() {
        let base =
            spawn_provider(json!({"sub": "g-1", "email": "Alice@Gmail.com", "name": "Alice"})).await;
        let oauth = oauth(&base);
        let state = state_from(&oauth.authorization_url().unwrap());

        let identity = oauth
            .complete(&GoogleCallback {
                code: Some("code".to_string()),
                state: Some(state),
                error: None,
            })
            .await
            .unwrap();
        assert_eq!(identity.google_id, "g-1");
        assert_eq!(identity.email, "Alice@Gmail.com");
    }

    #[tokio::test]
    async fn callback_rejects_unknown_state_and_incomplete_profile() {
        let base = spawn_provider(json!({"sub": "g-1"})).await;
        let oauth = oauth(&base);

        let err = oauth
            .complete(&GoogleCallback {
                code: Some("code".to_string()),
                state: Some("forged".to_string()),
                error: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GoogleAuthError::InvalidState));

        let state = state_from(&oauth.authorization_url().unwrap());
        let err = oauth
            .complete(&GoogleCallback {
                code: Some("code".to_string()),
                state: Some(state),
                error: None,
            })
            .await
            .unwrap_err();
        assert_eq!(
            AuthError::from(err).to_string(),
            "Incomplete user information from Google"
        );
    }

    #[test]
    fn provider_errors_map_to_unauthorized_detail() {
        let err = AuthError::from(GoogleAuthError::Provider("access_denied".to_string()));
        assert_eq!(
            err.to_string(),
            "Google authentication failed: access_denied"
        );
    }
}
