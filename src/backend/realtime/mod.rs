//! Live connection handling
//!
//! WebSocket upgrade, per-connection event loop, and request dispatch for
//! the wire contract frames.

pub mod connection;

pub use connection::websocket_handler;
