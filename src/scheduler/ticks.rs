/*!
 * Tick Conversion
 * Millisecond <-> tick arithmetic at the scheduler's granularity
 */

use super::types::TickCount;
use std::time::Duration;

/// Convert milliseconds to ticks
///
/// Any nonzero request waits at least one tick; a zero-tick delay would only
/// yield.
#[inline]
pub fn ms_to_ticks(ms: u64, tick_rate_hz: u32) -> TickCount {
    let ticks = (ms as u128 * tick_rate_hz as u128 / 1000).min(TickCount::MAX as u128) as TickCount;
    if ms > 0 && ticks == 0 {
        1
    } else {
        ticks
    }
}

/// Convert a duration to ticks with the same one-tick floor
#[inline]
pub fn duration_to_ticks(duration: Duration, tick_rate_hz: u32) -> TickCount {
    let ticks = (duration.as_nanos() * tick_rate_hz as u128 / 1_000_000_000)
        .min(TickCount::MAX as u128) as TickCount;
    if !duration.is_zero() && ticks == 0 {
        1
    } else {
        ticks
    }
}

/// Convert ticks back to milliseconds
#[inline]
pub fn ticks_to_ms(ticks: TickCount, tick_rate_hz: u32) -> u64 {
    (ticks as u128 * 1000 / tick_rate_hz.max(1) as u128).min(u64::MAX as u128) as u64
}

/// Wall-clock length of `ticks`, `None` if it does not fit a `Duration`
#[inline]
pub fn ticks_to_duration(ticks: TickCount, tick_rate_hz: u32) -> Option<Duration> {
    let nanos = ticks as u128 * 1_000_000_000 / tick_rate_hz.max(1) as u128;
    u64::try_from(nanos).ok().map(Duration::from_nanos)
}
