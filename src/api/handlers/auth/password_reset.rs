//! Password recovery and change endpoints.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

use super::{
    errors::AuthError,
    guard::{enforce_rate_limit, json_body, verify_captcha},
    principal::require_auth,
    rate_limit::RateLimitAction,
    service,
    state::{AuthState, Environment},
    types::{
        ChangePasswordRequest, ErrorResponse, ForgotPasswordRequest, MessageResponse,
        ResetPasswordRequest,
    },
    utils::{build_reset_url, normalize_email, validate_email, validate_length, validate_new_password},
};

const FORGOT_PASSWORD_MESSAGE: &str = "If the email exists, a password reset link has been sent";

#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Same response whether or not the email exists", body = MessageResponse),
        (status = 400, description = "reCAPTCHA failed", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    enforce_rate_limit(
        &state,
        &headers,
        peer.as_ref(),
        RateLimitAction::ForgotPassword,
    )?;

    let request = json_body(payload)?;
    validate_email(&normalize_email(&request.email))?;

    verify_captcha(&state, request.recaptcha_token.as_deref(), "forgot_password").await?;

    if let Some(token) = service::request_password_reset(&state, &request.email).await? {
        // No mail transport yet; development builds print the link instead.
        if state.config().environment() == Environment::Development {
            let reset_url = build_reset_url(state.config().frontend_url(), &token);
            info!("Password reset link: {reset_url}");
        }
    }

    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced; the token cannot be reused", body = MessageResponse),
        (status = 400, description = "Invalid or expired reset token", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    enforce_rate_limit(
        &state,
        &headers,
        peer.as_ref(),
        RateLimitAction::ResetPassword,
    )?;

    let request = json_body(payload)?;
    validate_length("token", &request.token, 1, usize::MAX)?;
    validate_new_password("newPassword", &request.new_password)?;

    service::reset_password(&state, &request.token, &request.new_password).await?;

    Ok(Json(MessageResponse::new(
        "Password has been successfully reset",
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Not authenticated or current password is incorrect", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    enforce_rate_limit(
        &state,
        &headers,
        peer.as_ref(),
        RateLimitAction::PasswordChange,
    )?;

    let principal = require_auth(&headers, &state).await?;

    let request = json_body(payload)?;
    validate_length("currentPassword", &request.current_password, 1, 100)?;
    validate_new_password("newPassword", &request.new_password)?;

    service::change_password(
        &state,
        &principal.user,
        &request.current_password,
        &request.new_password,
    )
    .await?;

    Ok(Json(MessageResponse::new(
        "Password has been successfully changed",
    )))
}
