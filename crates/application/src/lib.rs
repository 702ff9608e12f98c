//! Mystic Application - Session core and use cases
//!
//! This crate defines the application layer with:
//! - Port traits (HTTP transport, session storage)
//! - The token store and the request pipeline with single-flight refresh
//! - Authentication and typed resource clients
//! - Application-level error handling

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod resources;
pub mod session;
pub mod spread;

pub use auth::AuthService;
pub use error::{ApiError, ApplicationError, ApplicationResult, AuthError, NetworkError, StorageError};
pub use pipeline::{REFRESH_PATH, RequestPipeline};
pub use ports::{HttpTransport, SessionStorage};
pub use resources::{HistoryApi, TarotApi};
pub use session::{InMemorySessionStorage, SessionEvent, TokenStore};
pub use spread::{SpreadSelection, draw_spread};
