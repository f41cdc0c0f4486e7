//! Backend Module
//!
//! All server-side code. The backend is organized into focused submodules:
//!
//! - **`server`** - Configuration, application state, service wiring
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`gateway`** - Message gateway (validation, fanout, durable append)
//! - **`log`** - Durable log abstraction and in-process implementation
//! - **`consumer`** - Persistence consumer (batch reads, batch commits)
//! - **`storage`** - Relational message store
//! - **`presence`** - Presence tracker and presence fanout listener
//! - **`sessions`** - Session registry (user -> connection binding)
//! - **`bus`** - Cross-instance event bus and Redis cluster bridge
//! - **`cache`** - Shared key-value/set store with TTL semantics
//! - **`friends`** - Friend directory collaborator interface
//! - **`realtime`** - WebSocket connection handling
//! - **`auth`** - Token verification for connections and requests
//! - **`middleware`** - Request middleware
//! - **`error`** - Backend error types

pub mod auth;
pub mod bus;
pub mod cache;
pub mod consumer;
pub mod error;
pub mod friends;
pub mod gateway;
pub mod log;
pub mod middleware;
pub mod presence;
pub mod realtime;
pub mod routes;
pub mod server;
pub mod sessions;
pub mod storage;
