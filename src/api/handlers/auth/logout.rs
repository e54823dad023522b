//! `POST /api/v1/auth/logout`

use axum::{extract::Extension, http::HeaderMap, Json};
use std::sync::Arc;
use tracing::debug;

use super::{
    errors::AuthError,
    principal::require_auth,
    service::{format_expiry, revoke},
    state::AuthState,
    types::{ErrorResponse, MessageResponse},
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Access token revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let principal = require_auth(&headers, &state).await?;

    if !revoke(&state, &principal.claims) {
        return Err(AuthError::RevokedToken);
    }
    debug!(
        "Revoked access token {} of user {} until {}",
        principal.claims.jti,
        principal.user.id,
        format_expiry(principal.claims.exp)
    );

    Ok(Json(MessageResponse::new("Successfully logged out")))
}
