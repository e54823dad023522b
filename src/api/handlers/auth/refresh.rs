//! `POST /api/v1/auth/refresh`

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use super::{
    errors::AuthError,
    guard::{enforce_rate_limit, json_body},
    rate_limit::RateLimitAction,
    service,
    state::AuthState,
    types::{ErrorResponse, TokenRefresh, TokenResponse},
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = TokenRefresh,
    responses(
        (status = 200, description = "New token pair; the presented refresh token is revoked", body = TokenResponse),
        (status = 400, description = "Inactive account", body = ErrorResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<TokenRefresh>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    enforce_rate_limit(&state, &headers, peer.as_ref(), RateLimitAction::Refresh)?;

    let request = json_body(payload)?;

    service::refresh_tokens(&state, &request.refresh_token)
        .await
        .map(Json)
}
