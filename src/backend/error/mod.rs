//! Backend Error Module
//!
//! Error types for the delivery pipeline and their HTTP conversions.
//!
//! # Taxonomy
//!
//! - `InvalidInput` - empty receiver or body; rejected synchronously, never
//!   retried
//! - `TransientInfra` - log or store temporarily unavailable; retried with
//!   bounded backoff before being surfaced
//! - `Parse` - malformed queued payload; skipped and logged, never stalls a
//!   batch
//! - `Auth` - missing or invalid session; the connection or request is
//!   rejected immediately

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::BackendError;
