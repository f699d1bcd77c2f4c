//! ID generation utilities.

use uuid::Uuid;

/// Generates a new UUID v7 as a string.
///
/// Used to correlate a request with its replays in log output.
/// UUID v7 includes timestamp information and is sortable.
#[must_use]
pub fn generate_id_v7() -> String {
    Uuid::now_v7().to_string()
}
