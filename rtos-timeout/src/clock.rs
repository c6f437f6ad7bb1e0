//! Tick bookkeeping shared by the queue and the announce engine.

use core::cell::Cell;

use crate::Ticks;

/// The monotonic tick counter and the state of the announcement in progress.
///
/// Only reachable through the queue lock.
pub(crate) struct TickClock {
    /// Fully announced ticks since boot.
    curr_tick: Cell<Ticks>,
    /// Ticks of the current announcement not yet added to `curr_tick`.
    announce_remaining: Cell<Ticks>,
    /// Set for the whole duration of an announcement, including while the
    /// lock is released around a callback.
    announcing: Cell<bool>,
}

impl TickClock {
    pub const fn new() -> Self {
        Self {
            curr_tick: Cell::new(0),
            announce_remaining: Cell::new(0),
            announcing: Cell::new(false),
        }
    }

    #[inline]
    pub fn curr_tick(&self) -> Ticks {
        self.curr_tick.get()
    }

    #[inline]
    pub fn announce_remaining(&self) -> Ticks {
        self.announce_remaining.get()
    }

    #[inline]
    pub fn is_announcing(&self) -> bool {
        self.announcing.get()
    }

    /// Start announcing `ticks`.
    pub fn begin(&self, ticks: Ticks) {
        debug_assert!(!self.announcing.get(), "announcements must not overlap");
        self.announcing.set(true);
        self.announce_remaining.set(ticks);
    }

    /// Consume `ticks` of the current announcement, moving them into
    /// `curr_tick`.
    pub fn consume(&self, ticks: Ticks) {
        debug_assert!(ticks <= self.announce_remaining.get());
        self.curr_tick.set(self.curr_tick.get().saturating_add(ticks));
        self.announce_remaining
            .set(self.announce_remaining.get() - ticks);
    }

    /// Move whatever is left of the announcement into `curr_tick` and leave
    /// the announcing state.
    pub fn finish(&self) {
        self.consume(self.announce_remaining.get());
        self.announcing.set(false);
    }
}
