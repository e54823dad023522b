//! `GET /api/v1/auth/google/login` and `GET /api/v1/auth/google/callback`

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::{header::LOCATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use super::{
    errors::AuthError,
    google::GoogleCallback,
    guard::enforce_rate_limit,
    rate_limit::RateLimitAction,
    service,
    state::AuthState,
    types::{ErrorResponse, LoginResponse},
};

#[utoipa::path(
    get,
    path = "/api/v1/auth/google/login",
    responses(
        (status = 302, description = "Redirect to the Google consent screen"),
        (status = 429, description = "Rate limited", body = ErrorResponse),
        (status = 503, description = "Google OAuth is not configured", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    enforce_rate_limit(&state, &headers, peer.as_ref(), RateLimitAction::GoogleLogin)?;
    let google = state.google().ok_or(AuthError::OAuthNotConfigured)?;
    let url = google.authorization_url()?;
    Ok((StatusCode::FOUND, [(LOCATION, url.to_string())]))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/google/callback",
    params(GoogleCallback),
    responses(
        (status = 200, description = "Signed in with Google", body = LoginResponse),
        (status = 400, description = "Inactive account", body = ErrorResponse),
        (status = 401, description = "Google authentication failed", body = ErrorResponse),
        (status = 503, description = "Google OAuth is not configured", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_callback(
    Extension(state): Extension<Arc<AuthState>>,
    Query(callback): Query<GoogleCallback>,
) -> Result<Json<LoginResponse>, AuthError> {
    let google = state.google().ok_or(AuthError::OAuthNotConfigured)?;

    let identity = google.complete(&callback).await.map_err(|err| {
        warn!("Google sign-in rejected: {err}");
        AuthError::from(err)
    })?;

    service::authenticate_with_google(&state, &identity.email, &identity.name)
        .await
        .map(Json)
}
