//! Request guards

mod content_type;

pub use content_type::{is_json, require_json};
