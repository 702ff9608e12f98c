//! Authentication flows for the Mystic client.
//!
//! This module provides:
//! - Login and registration over the unauthenticated pipeline path
//! - Logout, which tears the session down
//! - Profile reads from the cache or from `/users/me`

mod service;

pub use service::{AuthService, LOGIN_PATH, PROFILE_PATH, REGISTER_PATH};
