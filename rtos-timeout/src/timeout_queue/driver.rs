use crate::Ticks;

/// The hardware clock driver behind a [`TimeoutQueue`](super::TimeoutQueue).
///
/// The driver counts hardware ticks and calls
/// [`TimeoutQueue::announce`](super::TimeoutQueue::announce) from its interrupt
/// with the number of ticks elapsed since the previous announcement. Calls to
/// `announce` must be serialized by the driver.
pub trait ClockDriver {
    /// Ticks elapsed since the last announcement.
    ///
    /// The queue does not call this while an announcement is in progress, so
    /// implementations need not guard against double counting.
    fn elapsed_ticks(&self) -> Ticks;

    /// Program the comparator to fire `ticks` ticks from now, or disarm it
    /// when `ticks` is `None`.
    ///
    /// `idle` is a hint that the caller is about to idle until the deadline.
    /// The driver may clamp a deadline it cannot reach to its own minimum
    /// granularity.
    ///
    /// **Note:** This is called with the queue lock held.
    fn set_next_deadline(&self, ticks: Option<Ticks>, idle: bool);

    /// The tick rate. May be read from hardware at runtime.
    fn ticks_per_sec(&self) -> u32;
}

/// The scheduler's time-slice accounting, as seen by the timeout queue.
pub trait Scheduler {
    /// Optional. Called once per announcement, before any timeout fires, with
    /// the number of ticks being announced.
    fn announce(&self, ticks: Ticks) {
        let _ = ticks;
    }

    /// Optional. Ticks left in the current time slice, `None` when time
    /// slicing is off. A non-zero value clamps
    /// [`TimeoutQueue::next_expiry`](super::TimeoutQueue::next_expiry).
    fn slice_ticks(&self) -> Option<Ticks> {
        None
    }
}

/// No time slicing.
impl Scheduler for () {}

impl<T: ClockDriver + ?Sized> ClockDriver for &T {
    #[inline]
    fn elapsed_ticks(&self) -> Ticks {
        (**self).elapsed_ticks()
    }

    #[inline]
    fn set_next_deadline(&self, ticks: Option<Ticks>, idle: bool) {
        (**self).set_next_deadline(ticks, idle)
    }

    #[inline]
    fn ticks_per_sec(&self) -> u32 {
        (**self).ticks_per_sec()
    }
}

impl<T: Scheduler + ?Sized> Scheduler for &T {
    #[inline]
    fn announce(&self, ticks: Ticks) {
        (**self).announce(ticks)
    }

    #[inline]
    fn slice_ticks(&self) -> Option<Ticks> {
        (**self).slice_ticks()
    }
}
