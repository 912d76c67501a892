//! UUID utilities

use uuid::Uuid;

/// Generate a new opaque identifier (UUIDv4, hyphenated)
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
