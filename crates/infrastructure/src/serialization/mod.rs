//! JSON encoding of files the client writes to disk.
//!
//! Output is stable so repeated writes of the same session produce the same
//! bytes: keys in `BTreeMap` order, 2-space indentation, trailing newline.

mod json;

pub use json::{SerializationError, from_json_bytes, to_json_stable_bytes};
