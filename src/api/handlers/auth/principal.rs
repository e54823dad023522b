//! Bearer-token authentication for protected endpoints.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::{
    errors::AuthError,
    service::verify_token,
    state::AuthState,
    storage::User,
    tokens::{Claims, TokenType},
};

/// Authenticated user together with the claims of the access token used.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
    pub claims: Claims,
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the `Authorization` header into an active user.
pub async fn require_auth(headers: &HeaderMap, state: &AuthState) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::NotAuthenticated)?;
    let claims = verify_token(state, &token, TokenType::Access)?;
    let user_id = claims.user_id()?.to_string();

    let user = state
        .store()
        .find_by_id(&user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    Ok(Principal { user, claims })
}
