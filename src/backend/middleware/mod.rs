//! Request authentication
//!
//! Shared bearer-token verification used by the HTTP routes and the
//! WebSocket upgrade path.

pub mod auth;

pub use auth::{authenticate_bearer, authenticate_token, AuthenticatedUser};
