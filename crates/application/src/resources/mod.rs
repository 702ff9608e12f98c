//! Typed clients for the backend's resource endpoints.
//!
//! Each client is a thin wrapper that builds the request, sends it through
//! the shared [`RequestPipeline`](crate::pipeline::RequestPipeline) and
//! decodes the answer. None of them touch credentials.

mod history;
mod tarot;

pub use history::{HistoryApi, RECENT_HISTORY_LIMIT};
pub use tarot::TarotApi;
