//! Time-ordered note identifiers.
//!
//! Notes get UUIDv7 identifiers: the first 48 bits hold a Unix millisecond
//! timestamp, so identifier order follows creation order within a process.

use uuid::Uuid;

/// Generate a new UUIDv7 note identifier.
#[inline]
pub fn new_note_id() -> Uuid {
    Uuid::now_v7()
}
