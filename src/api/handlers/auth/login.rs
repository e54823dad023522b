//! `POST /api/v1/auth/login`

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use super::{
    errors::AuthError,
    guard::{enforce_rate_limit, json_body, verify_captcha},
    rate_limit::RateLimitAction,
    service,
    state::AuthState,
    types::{ErrorResponse, LoginResponse, UserLogin},
    utils::{normalize_email, validate_email, validate_login_password},
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = UserLogin,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Inactive account or reCAPTCHA failed", body = ErrorResponse),
        (status = 401, description = "Incorrect email or password", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<UserLogin>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    enforce_rate_limit(&state, &headers, peer.as_ref(), RateLimitAction::Login)?;

    let request = json_body(payload)?;
    validate_email(&normalize_email(&request.email))?;
    validate_login_password(&request.password)?;

    verify_captcha(&state, request.recaptcha_token.as_deref(), "login").await?;

    service::authenticate_user(&state, &request.email, &request.password)
        .await
        .map(Json)
}
