//! Presence Tracking
//!
//! Maintains the authoritative "who is online" set in the shared cache with
//! heartbeat expiry, and broadcasts online/offline transitions on the event
//! bus presence channel.
//!
//! State machine per user: `OFFLINE -> ONLINE` on first bound connection,
//! `ONLINE -> ONLINE` on heartbeat refresh (no transition event),
//! `ONLINE -> OFFLINE` when the connection closes explicitly or when the
//! heartbeat TTL expires after a crash.

mod listener;
mod tracker;

pub use listener::spawn_presence_listener;
pub use tracker::PresenceTracker;
