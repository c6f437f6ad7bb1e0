use crate::Ticks;

#[cfg(feature = "defmt-03")]
use crate::defmt;

/// Tunables of a [`TimeoutQueue`](super::TimeoutQueue).
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub(crate) smp: bool,
    pub(crate) imminent_ticks: Ticks,
    pub(crate) max_wait: Option<Ticks>,
}

impl TimeoutConfig {
    /// Single core, an imminent threshold of one tick, and no idle bound.
    pub const fn new() -> Self {
        Self {
            smp: false,
            imminent_ticks: 1,
            max_wait: None,
        }
    }

    /// Multi-core mode. Expiry hints are then always forwarded to the
    /// driver, because another core may be in the middle of an announcement.
    pub const fn smp(mut self, smp: bool) -> Self {
        self.smp = smp;
        self
    }

    /// On a single core, a programmed deadline at most this many ticks away
    /// is considered imminent and is left alone by
    /// [`TimeoutQueue::set_expiry_hint`](super::TimeoutQueue::set_expiry_hint).
    pub const fn imminent_ticks(mut self, ticks: Ticks) -> Self {
        self.imminent_ticks = ticks;
        self
    }

    /// What [`TimeoutQueue::next_expiry`](super::TimeoutQueue::next_expiry)
    /// reports when nothing is pending. `None` lets the system idle without a
    /// deadline; `Some(n)` wakes it up at least every `n` ticks.
    pub const fn max_wait(mut self, max_wait: Option<Ticks>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new()
    }
}
