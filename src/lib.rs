//! RelayChat - Real-time Chat Backend
//!
//! RelayChat is a horizontally scalable 1:1 chat backend. Its core is the
//! message delivery and presence pipeline: a message submitted on a live
//! connection is fanned out immediately to the recipient's active sessions,
//! durably queued with per-conversation ordering, and asynchronously
//! committed to relational storage with at-least-once semantics. Presence
//! transitions are tracked in a shared store with heartbeat expiry and
//! propagated to interested peers across any number of backend processes.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared with connection clients
//!   - The canonical conversation key and chat message records
//!   - Presence wire types and WebSocket frame definitions
//!
//! - **`backend`** - Server-side code
//!   - Axum HTTP/WebSocket server, routing, and middleware
//!   - Message gateway, durable log, and persistence consumer
//!   - Presence tracker, session registry, and cross-instance event bus
//!   - PostgreSQL persistence and Redis-backed cluster transport

pub mod shared;
pub mod backend;
