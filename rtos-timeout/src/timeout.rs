//! Relative timeouts.

use crate::{conversion, Ticks};

#[cfg(feature = "defmt-03")]
use crate::defmt;

/// How long a caller is willing to wait, relative to now.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Do not wait at all.
    NoWait,
    /// Wait without a deadline.
    Forever,
    /// Wait for this many ticks. Zero is treated as one tick when turned into
    /// a deadline.
    Ticks(Ticks),
}

impl Timeout {
    /// A timeout of `ticks` ticks.
    #[inline]
    pub const fn from_ticks(ticks: Ticks) -> Self {
        Self::Ticks(ticks)
    }

    /// A timeout of at least `ms` milliseconds at the given tick rate.
    #[inline]
    pub const fn from_millis(ms: u64, ticks_per_sec: u32) -> Self {
        Self::Ticks(conversion::ms_to_ticks_ceil(ms, ticks_per_sec))
    }

    /// A timeout of at least `duration` at the given tick rate.
    ///
    /// `duration` counts units of `NOM / DENOM` seconds; the result is rounded
    /// up to whole ticks.
    pub fn from_duration<const NOM: u32, const DENOM: u32>(
        duration: fugit::Duration<u64, NOM, DENOM>,
        ticks_per_sec: u32,
    ) -> Self {
        assert!(ticks_per_sec != 0, "the tick rate must be non-zero");

        let num = u128::from(duration.ticks()) * u128::from(NOM) * u128::from(ticks_per_sec);
        let den = u128::from(DENOM);
        let ticks = (num + den - 1) / den;

        Self::Ticks(Ticks::try_from(ticks).unwrap_or(Ticks::MAX))
    }

    /// The number of ticks to wait, `None` for [`Timeout::Forever`].
    #[inline]
    pub const fn ticks(self) -> Option<Ticks> {
        match self {
            Self::NoWait => Some(0),
            Self::Forever => None,
            Self::Ticks(ticks) => Some(ticks),
        }
    }
}
