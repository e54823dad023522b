//! API handlers.
//!
//! `auth` holds the `/api/v1/auth` routes and everything they depend on;
//! `health` and `root` are service-level endpoints.

pub mod auth;
pub mod health;
pub mod root;
