//! Token store adapter.
//!
//! Tokens are issued elsewhere; the gateway only ever reads them. A token
//! record carries the account's shared secret and the backend servers the
//! issuer allocated to it, keyed by service type.

pub mod sqlite;
pub mod store;
pub mod token;

pub use {
    sqlite::SqliteTokenStore,
    store::{MemoryTokenStore, TokenStore, TokenStoreError},
    token::Token,
};
