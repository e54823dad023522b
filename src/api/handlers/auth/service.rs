//! Auth business logic shared by the HTTP handlers.
//!
//! Handlers deal with rate limiting, reCAPTCHA and input validation; the
//! functions here assume validated input and only talk to the store, the token
//! service and the blacklist.

use chrono::{TimeZone, Utc};
use tracing::{debug, info, instrument};

use super::{
    errors::AuthError,
    password::{hash_password_blocking, verify_password_blocking},
    state::AuthState,
    storage::{CreateOutcome, User},
    tokens::{Claims, TokenType},
    types::{LoginResponse, TokenResponse},
    utils::{generate_random_token, hash_token, normalize_email},
};

pub(super) fn login_response(state: &AuthState, user: &User) -> Result<LoginResponse, AuthError> {
    let tokens = state.tokens().issue_pair(&user.id)?;
    Ok(LoginResponse {
        user: user.to_response(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
    })
}

/// Decode `token`, reject revoked tokens and require `expected` type.
pub(super) fn verify_token(
    state: &AuthState,
    token: &str,
    expected: TokenType,
) -> Result<Claims, AuthError> {
    let claims = state.tokens().decode(token)?;
    if state.blacklist().is_revoked(&claims.jti) {
        return Err(AuthError::RevokedToken);
    }
    if claims.token_type != expected {
        return Err(AuthError::InvalidTokenType);
    }
    Ok(claims)
}

/// Revoke the token behind `claims` until it would expire.
/// Returns `false` when another request revoked the token first.
pub(super) fn revoke(state: &AuthState, claims: &Claims) -> bool {
    state.blacklist().revoke(&claims.jti, claims.exp)
}

#[instrument(skip(state, password, name))]
pub(super) async fn register_user(
    state: &AuthState,
    email: &str,
    password: &str,
    name: &str,
) -> Result<LoginResponse, AuthError> {
    let email = normalize_email(email);

    if state.store().find_by_email(&email).await?.is_some() {
        return Err(AuthError::UserAlreadyExists);
    }

    let hashed_password = hash_password_blocking(password.to_string()).await?;
    let user = User::new(email, name.trim().to_string(), hashed_password);

    match state.store().create_user(user).await? {
        CreateOutcome::Created(user) => {
            info!("Registered user {}", user.id);
            login_response(state, &user)
        }
        CreateOutcome::Conflict => Err(AuthError::UserAlreadyExists),
    }
}

#[instrument(skip(state, password))]
pub(super) async fn authenticate_user(
    state: &AuthState,
    email: &str,
    password: &str,
) -> Result<LoginResponse, AuthError> {
    let email = normalize_email(email);

    let Some(user) = state.store().find_by_email(&email).await? else {
        return Err(AuthError::invalid_credentials());
    };

    if !verify_password_blocking(password.to_string(), user.hashed_password.clone()).await? {
        return Err(AuthError::invalid_credentials());
    }

    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    login_response(state, &user)
}

/// Exchange a refresh token for a new pair; the presented token is revoked.
#[instrument(skip_all)]
pub(super) async fn refresh_tokens(
    state: &AuthState,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let claims = verify_token(state, refresh_token, TokenType::Refresh)?;
    let user_id = claims.user_id()?.to_string();

    // Claim the token before awaiting so concurrent exchanges of it fail.
    if !revoke(state, &claims) {
        return Err(AuthError::RevokedToken);
    }

    let Some(user) = state.store().find_by_id(&user_id).await? else {
        return Err(AuthError::UserNotFound);
    };
    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    debug!("Rotated refresh token for user {}", user.id);

    state.tokens().issue_pair(&user.id)
}

/// Issue and store a reset token for an active user. Returns `None` for
/// unknown or inactive accounts so callers cannot probe for emails.
#[instrument(skip(state))]
pub(super) async fn request_password_reset(
    state: &AuthState,
    email: &str,
) -> Result<Option<String>, AuthError> {
    let email = normalize_email(email);

    let Some(user) = state.store().find_by_email(&email).await? else {
        return Ok(None);
    };
    if !user.is_active {
        return Ok(None);
    }

    let token = state.tokens().issue(&user.id, TokenType::PasswordReset)?;
    let expires_at = Utc::now() + state.tokens().reset_ttl();
    state
        .store()
        .set_reset_token(&user.id, &hash_token(&token), expires_at)
        .await?;

    Ok(Some(token))
}

#[instrument(skip_all)]
pub(super) async fn reset_password(
    state: &AuthState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let claims = state
        .tokens()
        .decode(token)
        .map_err(|_| AuthError::InvalidResetToken)?;
    if claims.token_type != TokenType::PasswordReset {
        return Err(AuthError::InvalidResetToken);
    }
    if state.store().find_by_id(&claims.sub).await?.is_none() {
        return Err(AuthError::InvalidResetToken);
    }

    let hashed_password = hash_password_blocking(new_password.to_string()).await?;
    let consumed = state
        .store()
        .consume_reset_token(&claims.sub, &hash_token(token), &hashed_password)
        .await?;

    if consumed {
        info!("Password reset for user {}", claims.sub);
        Ok(())
    } else {
        Err(AuthError::InvalidResetToken)
    }
}

#[instrument(skip(state, user, current_password, new_password), fields(user_id = %user.id))]
pub(super) async fn change_password(
    state: &AuthState,
    user: &User,
    current_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    if !verify_password_blocking(current_password.to_string(), user.hashed_password.clone())
        .await?
    {
        return Err(AuthError::InvalidCredentials(
            "Current password is incorrect".to_string(),
        ));
    }

    let hashed_password = hash_password_blocking(new_password.to_string()).await?;
    state
        .store()
        .update_password(&user.id, &hashed_password)
        .await?;
    Ok(())
}

/// Sign in a Google account, creating a local user on first use.
#[instrument(skip(state, name))]
pub(super) async fn authenticate_with_google(
    state: &AuthState,
    email: &str,
    name: &str,
) -> Result<LoginResponse, AuthError> {
    let email = normalize_email(email);

    let user = match state.store().find_by_email(&email).await? {
        Some(user) => user,
        None => {
            // Google accounts never log in with a password; store an unusable one.
            let random_password = generate_random_token()?;
            let hashed_password = hash_password_blocking(random_password).await?;
            let display_name = if name.trim().is_empty() {
                email.clone()
            } else {
                name.trim().to_string()
            };
            match state
                .store()
                .create_user(User::new(email.clone(), display_name, hashed_password))
                .await?
            {
                CreateOutcome::Created(user) => {
                    info!("Registered Google user {}", user.id);
                    user
                }
                // Lost a race with a concurrent first sign-in.
                CreateOutcome::Conflict => state
                    .store()
                    .find_by_email(&email)
                    .await?
                    .ok_or(AuthError::UserNotFound)?,
            }
        }
    };

    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    login_response(state, &user)
}

/// Seconds since the epoch rendered for logs.
pub(super) fn format_expiry(exp: i64) -> String {
    Utc.timestamp_opt(exp, 0)
        .single()
        .map_or_else(|| exp.to_string(), |at| at.to_rfc3339())
}
