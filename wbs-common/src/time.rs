//! Timestamp utilities

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Timestamp `ttl` after `from`, saturating at the far end of chrono's range
pub fn expiry_after(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
    from.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
