//! Reconnect backoff

use std::time::Duration;

/// Delay before reconnect attempt `attempt` (zero-indexed)
///
/// `min(base * 2^attempt, max)`. Overflow saturates to `max`.
pub fn delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(max, |d| d.min(max))
}
