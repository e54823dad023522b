//! Request checks shared by the auth handlers.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo},
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;
use tracing::warn;

use super::{
    errors::AuthError,
    rate_limit::{RateLimitAction, RateLimitDecision},
    state::AuthState,
    utils::extract_client_ip,
};

/// Unwrap a JSON body, turning extractor rejections into a 422.
pub(super) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthError::Validation(rejection.body_text()))
}

pub(super) fn enforce_rate_limit(
    state: &AuthState,
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    action: RateLimitAction,
) -> Result<(), AuthError> {
    let client_ip = extract_client_ip(headers, peer.map(|ConnectInfo(addr)| *addr));
    match state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), action)
    {
        RateLimitDecision::Allowed => Ok(()),
        RateLimitDecision::Limited(limit) => {
            warn!(
                "Rate limit hit for {action:?} from {}",
                client_ip.as_deref().unwrap_or("unknown")
            );
            Err(AuthError::RateLimited(limit.to_string()))
        }
    }
}

pub(super) async fn verify_captcha(
    state: &AuthState,
    token: Option<&str>,
    action: &str,
) -> Result<(), AuthError> {
    state.captcha().verify(token, action).await
}
