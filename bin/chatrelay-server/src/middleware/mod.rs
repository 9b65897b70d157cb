//! HTTP middleware stack.

pub mod auth;
pub mod cors;
pub mod trace;

pub use auth::{require_auth, AuthUser, AUTH_COOKIE};
