//! Conversions between kernel ticks and wall units.
//!
//! The tick rate is passed in explicitly because drivers may only learn it at
//! runtime (see [`ClockDriver::ticks_per_sec`]). Intermediate products are
//! computed in `u128`; results that do not fit saturate at `u64::MAX`.
//!
//! [`ClockDriver::ticks_per_sec`]: crate::ClockDriver::ticks_per_sec

use crate::Ticks;

const MS_PER_SEC: u64 = 1_000;
const US_PER_SEC: u64 = 1_000_000;

#[inline]
const fn convert(value: u64, from_hz: u64, to_hz: u64, round_up: bool) -> u64 {
    assert!(from_hz != 0, "the tick rate must be non-zero");

    let scaled = value as u128 * to_hz as u128;
    let from_hz = from_hz as u128;
    let out = if round_up {
        (scaled + from_hz - 1) / from_hz
    } else {
        scaled / from_hz
    };

    if out > u64::MAX as u128 {
        u64::MAX
    } else {
        out as u64
    }
}

/// Ticks to milliseconds, rounding down.
#[inline]
pub const fn ticks_to_ms_floor(ticks: Ticks, ticks_per_sec: u32) -> u64 {
    convert(ticks, ticks_per_sec as u64, MS_PER_SEC, false)
}

/// Ticks to milliseconds, rounding up.
#[inline]
pub const fn ticks_to_ms_ceil(ticks: Ticks, ticks_per_sec: u32) -> u64 {
    convert(ticks, ticks_per_sec as u64, MS_PER_SEC, true)
}

/// Milliseconds to ticks, rounding up so a wait is never shorter than asked.
#[inline]
pub const fn ms_to_ticks_ceil(ms: u64, ticks_per_sec: u32) -> Ticks {
    assert!(ticks_per_sec != 0, "the tick rate must be non-zero");
    convert(ms, MS_PER_SEC, ticks_per_sec as u64, true)
}

/// Ticks to microseconds, rounding down.
#[inline]
pub const fn ticks_to_us_floor(ticks: Ticks, ticks_per_sec: u32) -> u64 {
    convert(ticks, ticks_per_sec as u64, US_PER_SEC, false)
}

/// Microseconds to ticks, rounding up.
#[inline]
pub const fn us_to_ticks_ceil(us: u64, ticks_per_sec: u32) -> Ticks {
    assert!(ticks_per_sec != 0, "the tick rate must be non-zero");
    convert(us, US_PER_SEC, ticks_per_sec as u64, true)
}
