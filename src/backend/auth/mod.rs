//! Session tokens
//!
//! JWT creation and validation for authenticated connections.

pub mod sessions;

pub use sessions::{create_token, verify_token, Claims};
