//! Client for the `/api/v1/auth` service.
//!
//! [`AuthClient`] attaches `Authorization: Bearer <accessToken>` from its
//! [`TokenStore`] to every authenticated request. A `401` starts a refresh
//! through `POST /api/v1/auth/refresh`; requests failing while that refresh is
//! in flight wait for it instead of starting their own, then replay once with
//! the new token. A replayed request that fails again is returned as is.
//!
//! When the refresh fails the stored tokens are cleared, the session expired
//! hook is called with the login path and the call returns
//! [`ClientError::SessionExpired`].

mod errors;
mod refresh;
mod storage;

pub use errors::ClientError;
pub use storage::{
    FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};

use crate::{
    api::handlers::auth::types::{
        ChangePasswordRequest, ErrorResponse, ForgotPasswordRequest, LoginResponse,
        MessageResponse, ResetPasswordRequest, TokenRefresh, TokenResponse, UserLogin,
        UserRegister, UserResponse,
    },
    APP_USER_AGENT,
};
use refresh::{RefreshOutcome, Role, SingleFlight};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Client, Method, Request, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const DEFAULT_LOGIN_PATH: &str = "/login";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

const REGISTER_PATH: &str = "/api/v1/auth/register";
const LOGIN_PATH: &str = "/api/v1/auth/login";
const REFRESH_PATH: &str = "/api/v1/auth/refresh";
const LOGOUT_PATH: &str = "/api/v1/auth/logout";
const ME_PATH: &str = "/api/v1/auth/me";
const FORGOT_PASSWORD_PATH: &str = "/api/v1/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/api/v1/auth/reset-password";
const CHANGE_PASSWORD_PATH: &str = "/api/v1/auth/change-password";

pub type SessionExpiredHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Cloning is cheap; clones share the token store and the refresh state.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    login_path: String,
    on_session_expired: Option<SessionExpiredHook>,
    refresh: Arc<SingleFlight>,
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.base_url)
            .field("login_path", &self.login_path)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Client with an in-memory token store.
    /// # Errors
    /// Return error if `base_url` is not an absolute URL or the HTTP client
    /// cannot be built
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|err| ClientError::Config(format!("{base_url}: {err}")))?;

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            store: Arc::new(MemoryTokenStore::new()),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            on_session_expired: None,
            refresh: Arc::default(),
        })
    }

    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Called with the login path once a refresh has failed.
    #[must_use]
    pub fn with_session_expired_hook(
        mut self,
        hook: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn token_store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim().trim_start_matches('/'))
    }

    /// Request builder for `path`; pass it to [`AuthClient::send`] to
    /// authenticate it.
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Send an authenticated request, refreshing the access token on `401`.
    ///
    /// Only the `401` itself is handled here; other statuses are returned to
    /// the caller unchanged. Requests whose body cannot be cloned are not
    /// replayed.
    ///
    /// # Errors
    /// [`ClientError::SessionExpired`] when no credentials are stored or the
    /// refresh failed, [`ClientError::Cancelled`] when the refreshing request
    /// was dropped, and transport errors
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let mut request = request.build()?;
        let sent_token = self.store.access_token();
        if sent_token.is_none() && self.store.refresh_token().is_none() {
            debug!("No stored credentials for {}", request.url());
            return Err(self.session_expired());
        }

        let replay = request.try_clone();
        if let Some(token) = sent_token.as_deref() {
            set_bearer(&mut request, token)?;
        }

        let response = self.http.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(mut replay) = replay else {
            warn!("Request body cannot be replayed, returning 401");
            return Ok(response);
        };

        let token = self.refreshed_token(sent_token.as_deref()).await?;
        set_bearer(&mut replay, &token)?;

        // Replayed once; a second 401 goes back to the caller.
        Ok(self.http.execute(replay).await?)
    }

    /// Force a refresh, joining one already in flight.
    /// # Errors
    /// [`ClientError::SessionExpired`] if the refresh was rejected
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let current = self.store.access_token();
        self.refreshed_token(current.as_deref()).await
    }

    /// Register and keep the returned tokens.
    /// # Errors
    /// Return error if the request fails or the server rejects it
    #[instrument(skip_all)]
    pub async fn register(&self, request: &UserRegister) -> Result<LoginResponse, ClientError> {
        let login: LoginResponse = self.post_public(REGISTER_PATH, request).await?;
        self.store
            .set_tokens(&login.access_token, &login.refresh_token)?;
        Ok(login)
    }

    /// Log in and keep the returned tokens.
    /// # Errors
    /// Return error if the request fails or the credentials are rejected
    #[instrument(skip_all)]
    pub async fn login(&self, request: &UserLogin) -> Result<LoginResponse, ClientError> {
        let login: LoginResponse = self.post_public(LOGIN_PATH, request).await?;
        self.store
            .set_tokens(&login.access_token, &login.refresh_token)?;
        Ok(login)
    }

    /// Revoke the access token server side when possible, then forget both
    /// tokens regardless of the outcome.
    /// # Errors
    /// Return error only if local storage cannot be cleared
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(token) = self.store.access_token() {
            match self
                .request(Method::POST, LOGOUT_PATH)
                .bearer_auth(token)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => debug!("Logged out"),
                Ok(response) => debug!("Logout returned {}", response.status()),
                Err(err) => warn!("Logout request failed: {err}"),
            }
        }
        self.store.clear()
    }

    /// # Errors
    /// Return error if the request fails or the session expired
    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        let response = self.send(self.request(Method::GET, ME_PATH)).await?;
        json_response(response).await
    }

    /// # Errors
    /// Return error if the request fails or the server rejects it
    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.post_public(FORGOT_PASSWORD_PATH, request).await
    }

    /// # Errors
    /// Return error if the request fails or the token is rejected
    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.post_public(RESET_PASSWORD_PATH, request).await
    }

    /// # Errors
    /// Return error if the request fails, the current password is wrong or
    /// the session expired
    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        let response = self
            .send(self.request(Method::POST, CHANGE_PASSWORD_PATH).json(request))
            .await?;
        json_response(response).await
    }

    // Public endpoints never carry a bearer token and never refresh.
    async fn post_public<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        json_response(response).await
    }

    async fn refreshed_token(&self, sent_token: Option<&str>) -> Result<String, ClientError> {
        let role = self
            .refresh
            .join(|| self.store.access_token().as_deref() != sent_token);

        match role {
            Role::Stale => {
                debug!("Access token rotated by another request");
                self.store
                    .access_token()
                    .ok_or_else(|| self.session_expired_error())
            }
            Role::Waiter(receiver) => match refresh::wait(receiver).await {
                RefreshOutcome::Refreshed(token) => Ok(token),
                RefreshOutcome::Failed => Err(self.session_expired_error()),
                RefreshOutcome::Cancelled => Err(ClientError::Cancelled),
            },
            Role::Leader(guard) => match self.refresh_tokens().await {
                Ok(token) => {
                    guard.settle(&RefreshOutcome::Refreshed(token.clone()));
                    Ok(token)
                }
                Err(err) => {
                    warn!("Token refresh failed: {err}");
                    if let Err(err) = self.store.clear() {
                        error!("Failed to clear stored tokens: {err}");
                    }
                    guard.settle(&RefreshOutcome::Failed);
                    Err(self.session_expired())
                }
            },
        }
    }

    #[instrument(skip_all)]
    async fn refresh_tokens(&self) -> Result<String, ClientError> {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or(ClientError::MissingRefreshToken)?;

        let response = self
            .request(Method::POST, REFRESH_PATH)
            .json(&TokenRefresh { refresh_token })
            .send()
            .await?;
        let tokens: TokenResponse = json_response(response).await?;

        self.store
            .set_tokens(&tokens.access_token, &tokens.refresh_token)?;
        debug!("Access token refreshed");
        Ok(tokens.access_token)
    }

    fn session_expired_error(&self) -> ClientError {
        ClientError::SessionExpired {
            login_path: self.login_path.clone(),
        }
    }

    fn session_expired(&self) -> ClientError {
        if let Some(hook) = &self.on_session_expired {
            hook(&self.login_path);
        }
        self.session_expired_error()
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), ClientError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

async fn json_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Http {
        status,
        message: error_message(&body),
    })
}

/// `detail` of an API error, or the trimmed raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map_or_else(
        |_| body.trim().chars().take(MAX_ERROR_CHARS).collect(),
        |err| err.detail,
    )
}

#[cfg(test)]
mod tests;
