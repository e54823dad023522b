//! `GET /api/v1/auth/me`

use axum::{extract::Extension, http::HeaderMap, Json};
use std::sync::Arc;

use super::{
    errors::AuthError,
    principal::require_auth,
    state::AuthState,
    types::{ErrorResponse, UserResponse},
};

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
) -> Result<Json<UserResponse>, AuthError> {
    let principal = require_auth(&headers, &state).await?;
    Ok(Json(principal.user.to_response()))
}
