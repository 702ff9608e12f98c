//! Session module for the Mystic client.
//!
//! This module provides:
//! - The persisted token store with an in-memory snapshot
//! - An in-memory storage backend for tests and ephemeral sessions
//! - Session lifecycle events for the navigation layer

mod events;
mod memory;
mod token_store;

pub use events::SessionEvent;
pub use memory::InMemorySessionStorage;
pub use token_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore, USER_KEY};
