//! Auth handlers and supporting modules.
//!
//! Every route lives under `/api/v1/auth`. Access and refresh tokens are HS256
//! JWTs (see [`tokens`]); protected routes take `Authorization: Bearer`.
//!
//! ## Refresh Rotation
//!
//! `/refresh` revokes the refresh token it was called with, so each refresh
//! token can be exchanged exactly once. Revocations are kept in a
//! [`TokenBlacklist`] keyed by `jti` until the token expires.
//!
//! ## Rate Limiting
//!
//! Public endpoints are limited per client IP with fixed windows:
//!
//! - **register, forgot-password, reset-password:** 5/minute each by default.
//! - **login, google/login:** 10/minute. **refresh:** 20/minute.
//! - **change-password:** 3/minute.
//!
//! ## reCAPTCHA
//!
//! When a secret is configured, register, login and forgot-password require a
//! `recaptchaToken` that Google scores for the matching action.

mod blacklist;
mod errors;
mod google;
pub(crate) mod google_login;
mod guard;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod me;
mod password;
pub(crate) mod password_reset;
pub(crate) mod principal;
mod rate_limit;
mod recaptcha;
pub(crate) mod refresh;
pub(crate) mod register;
mod service;
mod state;
mod storage;
pub mod tokens;
pub mod types;
mod utils;

pub use blacklist::{MemoryBlacklist, TokenBlacklist};
pub use errors::AuthError;
pub use google::{
    GoogleOAuth, GoogleOAuthConfig, DEFAULT_GOOGLE_AUTH_URL, DEFAULT_GOOGLE_TOKEN_URL,
    DEFAULT_GOOGLE_USERINFO_URL,
};
pub use password::{hash_password, verify_password};
pub use rate_limit::{
    FixedWindowRateLimiter, NoopRateLimiter, RateLimit, RateLimitAction, RateLimitDecision,
    RateLimiter, RateLimits,
};
pub use recaptcha::{
    CaptchaVerifier, DisabledCaptcha, RecaptchaVerifier, DEFAULT_RECAPTCHA_MIN_SCORE,
    DEFAULT_RECAPTCHA_VERIFY_URL,
};
pub use state::{
    AuthConfig, AuthState, Environment, MAX_ACCESS_TOKEN_TTL_MINUTES, MAX_REFRESH_TOKEN_TTL_DAYS,
    MAX_RESET_TOKEN_TTL_SECONDS,
};
pub use storage::{CreateOutcome, MemoryUserStore, PgUserStore, StoreFuture, User, UserStore};
