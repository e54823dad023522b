//! # saaskit (SaaS starter kit authentication)
//!
//! `saaskit` bundles the authentication plumbing shared by SaaS applications:
//! an HTTP service issuing and rotating bearer tokens, and a client that
//! consumes it.
//!
//! ## Server (`api`)
//!
//! The `/api/v1/auth` routes cover registration, login, token refresh, logout,
//! the current user profile, password reset and change, and Google sign-in.
//! Access and refresh tokens are HS256 JWTs; refresh tokens rotate on every use
//! and revoked tokens are tracked in a blacklist until they expire.
//!
//! ## Client (`client`)
//!
//! [`client::AuthClient`] attaches the stored access token to every request.
//! When several requests fail with `401` at once, exactly one refresh call is
//! made; the other requests wait for it and are replayed with the new token.
//! A failed refresh clears the stored credentials and reports the session as
//! expired.

pub mod api;
pub mod cli;
pub mod client;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
