//! Live account sessions.
//!
//! One session per authenticated account, holding the client connection it
//! arrived on and the backend server it is pinned to for each service type.
//! The registry is sharded so unrelated accounts never contend.

pub mod registry;
pub mod session;

pub use {
    registry::SessionRegistry,
    session::{ClientHandle, Session},
};
