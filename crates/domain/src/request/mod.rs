//! API request descriptors

mod api_request;
mod method;

pub use api_request::{ApiRequest, AuthAttempt, path_segment};
pub use method::HttpMethod;
