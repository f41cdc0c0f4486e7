//! Server configuration, shared state, and startup wiring.

pub mod config;
pub mod init;
pub mod state;
