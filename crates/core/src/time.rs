//! Wall-clock access.

use chrono::Utc;

/// Current unix time in whole seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
