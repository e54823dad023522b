//! `POST /api/v1/auth/register`

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use super::{
    errors::AuthError,
    guard::{enforce_rate_limit, json_body, verify_captcha},
    rate_limit::RateLimitAction,
    service,
    state::AuthState,
    types::{ErrorResponse, LoginResponse, UserRegister},
    utils::{normalize_email, validate_email, validate_name, validate_new_password},
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = UserRegister,
    responses(
        (status = 201, description = "User created and signed in", body = LoginResponse),
        (status = 400, description = "reCAPTCHA failed", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<UserRegister>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    enforce_rate_limit(&state, &headers, peer.as_ref(), RateLimitAction::Register)?;

    let request = json_body(payload)?;
    validate_email(&normalize_email(&request.email))?;
    validate_new_password("password", &request.password)?;
    validate_name(request.name.trim())?;

    verify_captcha(&state, request.recaptcha_token.as_deref(), "register").await?;

    let response =
        service::register_user(&state, &request.email, &request.password, &request.name).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
