//! Wall-clock helpers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time.
#[inline]
#[must_use]
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Last second of year 9999 UTC, the latest instant handed out by [`after`].
const FAR_FUTURE_SECS: u64 = 253_402_300_799;

/// Latest representable due time.
#[must_use]
pub fn far_future() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(FAR_FUTURE_SECS)
}

/// Wall-clock time `delay` from now, clamped to [`far_future`].
#[must_use]
pub fn after(delay: Duration) -> SystemTime {
    now()
        .checked_add(delay)
        .map_or_else(far_future, |at| at.min(far_future()))
}

/// Seconds since the Unix epoch, negative for instants before it.
#[must_use]
pub fn unix_secs(at: SystemTime) -> i64 {
    match at.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_secs()).map_or(i64::MIN, |s| -s),
    }
}

/// Time left until `at`, zero if it has passed.
#[must_use]
pub fn until(at: SystemTime) -> Duration {
    at.duration_since(now()).unwrap_or(Duration::ZERO)
}
