//! The timeout queue and the tick announcement engine.

use core::fmt;
use core::ptr;

use critical_section::{self as cs, CriticalSection, Mutex};

use crate::clock::TickClock;
use crate::conversion;
use crate::delta_list::{DeltaList, TimeoutFn, TimeoutNode};
use crate::{Ticks, Timeout};

#[cfg(feature = "defmt-03")]
use crate::defmt;

mod config;
mod driver;
pub use config::TimeoutConfig;
pub use driver::{ClockDriver, Scheduler};

/// Returned by [`TimeoutQueue::cancel`] when there was nothing to cancel.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// The node already fired, was never armed, or is armed on another queue.
    NotFound,
}

struct QueueState {
    list: DeltaList,
    clock: TickClock,
}

/// All pending timeouts of one kernel, ordered by expiry.
///
/// # Blocking
///
/// Every operation runs inside a global critical section. Adding a timeout
/// walks the list, so the lock is held for O(n) time in the number of pending
/// timeouts. [`TimeoutQueue::announce`] releases the lock around every
/// callback.
///
/// # Reentrancy
///
/// Callbacks run from [`TimeoutQueue::announce`] may call any method of the
/// queue except `announce` itself; a callback may re-arm the node it was
/// called for.
pub struct TimeoutQueue<D, S = ()> {
    state: Mutex<QueueState>,
    driver: D,
    scheduler: S,
    config: TimeoutConfig,
}

impl<D> TimeoutQueue<D> {
    /// Make a new queue without time slicing.
    pub const fn new(driver: D, config: TimeoutConfig) -> Self {
        Self::with_scheduler(driver, (), config)
    }
}

impl<D, S> TimeoutQueue<D, S> {
    /// Make a new queue that consults `scheduler` for time slices.
    pub const fn with_scheduler(driver: D, scheduler: S, config: TimeoutConfig) -> Self {
        Self {
            state: Mutex::new(QueueState {
                list: DeltaList::new(),
                clock: TickClock::new(),
            }),
            driver,
            scheduler,
            config,
        }
    }

    /// The clock driver.
    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The scheduler hooks.
    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The configuration the queue was built with.
    #[inline]
    pub fn config(&self) -> TimeoutConfig {
        self.config
    }

    #[inline]
    fn state<'cs>(&'cs self, cs: CriticalSection<'cs>) -> &'cs QueueState {
        self.state.borrow(cs)
    }
}

impl<D: ClockDriver, S: Scheduler> TimeoutQueue<D, S> {
    /// Ticks that have passed but are not part of `curr_tick` yet. During an
    /// announcement these are the ticks the announcement has not consumed;
    /// the driver's own count was handed over to `announce`.
    fn elapsed(&self, state: &QueueState) -> Ticks {
        if state.clock.is_announcing() {
            state.clock.announce_remaining()
        } else {
            self.driver.elapsed_ticks()
        }
    }

    fn next_timeout(&self, cs: CriticalSection<'_>, state: &QueueState) -> Option<Ticks> {
        let mut ret = match state.list.first() {
            Some(head) => Some(head.delta_ticks(cs).saturating_sub(self.elapsed(state))),
            None => self.config.max_wait,
        };

        if let Some(slice) = self.scheduler.slice_ticks() {
            if slice != 0 && ret.map_or(true, |ret| slice < ret) {
                ret = Some(slice);
            }
        }

        ret
    }

    /// Arm `node` to call `callback` once, `delay` ticks from now.
    ///
    /// A `delay` of zero is treated as one tick: the callback always runs from
    /// a later [`TimeoutQueue::announce`], never from this call or from the
    /// announcement in progress. If `node` becomes the soonest timeout the
    /// driver is reprogrammed, unless an announcement is in progress, which
    /// reprograms the driver when it ends.
    ///
    /// # Panics
    ///
    /// Panics if `node` is already armed, on this or any other queue.
    pub fn add(&self, node: &'static TimeoutNode, delay: Ticks, callback: TimeoutFn) {
        cs::with(|cs| {
            let state = self.state(cs);
            assert!(!node.linked(cs), "timeout node is already linked");

            let ticks = delay.max(1).saturating_add(self.elapsed(state));
            node.set_callback(cs, callback);
            let is_head = state.list.insert(cs, node, ticks);

            log::trace!(
                "timeout {:#x}: armed for {} ticks after tick {}",
                node.param(),
                ticks,
                state.clock.curr_tick()
            );

            if is_head && !state.clock.is_announcing() {
                self.driver
                    .set_next_deadline(self.next_timeout(cs, state), false);
            }
        });
    }

    /// Disarm `node`. Later timeouts keep their expiry.
    ///
    /// The driver is not reprogrammed: a deadline that now fires early is
    /// handled as an announcement with nothing due.
    pub fn cancel(&self, node: &'static TimeoutNode) -> Result<(), CancelError> {
        cs::with(|cs| {
            let state = self.state(cs);
            if !state.list.contains(cs, node) {
                return Err(CancelError::NotFound);
            }

            state.list.remove(cs, node);
            log::trace!("timeout {:#x}: cancelled", node.param());
            Ok(())
        })
    }

    /// Ticks until `node` fires, or zero if it is not armed on this queue.
    pub fn remaining(&self, node: &'static TimeoutNode) -> Ticks {
        cs::with(|cs| {
            let state = self.state(cs);
            if !state.list.contains(cs, node) {
                return 0;
            }

            let mut ticks: Ticks = 0;
            let mut cursor = state.list.first();
            while let Some(t) = cursor {
                ticks = ticks.saturating_add(t.delta_ticks(cs));
                if ptr::eq(t, node) {
                    break;
                }
                cursor = state.list.next(cs, t);
            }

            ticks.saturating_sub(self.elapsed(state))
        })
    }

    /// Ticks until the next expiry the driver has to wake up for, the end of
    /// the current time slice included. `None` means nothing is pending and
    /// the system may idle indefinitely.
    pub fn next_expiry(&self) -> Option<Ticks> {
        cs::with(|cs| self.next_timeout(cs, self.state(cs)))
    }

    /// Ask for a wakeup no later than `ticks` from now, e.g. before idling.
    ///
    /// On a single core the request is dropped if the queue already expects
    /// an interrupt at or before `ticks`, or if the pending deadline is
    /// imminent. With [`TimeoutConfig::smp`] the driver is always
    /// reprogrammed.
    pub fn set_expiry_hint(&self, ticks: Ticks, idle: bool) {
        cs::with(|cs| {
            let next = self.next_timeout(cs, self.state(cs));
            let sooner = next.map_or(true, |next| ticks < next);
            let imminent = next.map_or(false, |next| next <= self.config.imminent_ticks);

            if self.config.smp || (sooner && !imminent) {
                self.driver.set_next_deadline(Some(ticks), idle);
            } else {
                log::trace!("expiry hint {} dropped, next expiry {:?}", ticks, next);
            }
        });
    }

    /// Report `ticks` elapsed ticks. Called by the clock driver, usually
    /// from its interrupt handler; calls must not overlap.
    ///
    /// Every timeout that expires within the announced window fires in
    /// order. The lock is released around every callback; to callbacks and
    /// other readers "now" is already the end of the announced window, so
    /// [`TimeoutQueue::tick_get`] never goes backward and timeouts added
    /// meanwhile count from the end of the window. Finally the driver is
    /// programmed for the next expiry.
    pub fn announce(&self, ticks: Ticks) {
        self.scheduler.announce(ticks);

        cs::with(|cs| self.state(cs).clock.begin(ticks));

        let mut fired = 0usize;
        while let Some((node, callback)) = cs::with(|cs| self.pop_expired(cs)) {
            fired += 1;
            callback(node);
        }

        log::debug!("announced {} ticks, {} timeouts fired", ticks, fired);
    }

    /// One step of an announcement: unlink and return the head if it expires
    /// within what is left of the announcement. Otherwise charge the rest of
    /// the announcement to the head, end the announcement and reprogram the
    /// driver, all under the same lock.
    fn pop_expired(&self, cs: CriticalSection<'_>) -> Option<(&'static TimeoutNode, TimeoutFn)> {
        let state = self.state(cs);
        let remaining = state.clock.announce_remaining();

        if let Some(head) = state.list.first() {
            let dt = head.delta_ticks(cs);
            if dt <= remaining {
                state.clock.consume(dt);
                head.set_delta_ticks(cs, 0);
                state.list.remove(cs, head);
                return Some((head, head.callback(cs)));
            }

            head.set_delta_ticks(cs, dt - remaining);
        }

        state.clock.finish();
        let next = self.next_timeout(cs, state);
        log::trace!("tick {}: next deadline {:?}", state.clock.curr_tick(), next);
        self.driver.set_next_deadline(next, false);
        None
    }

    /// Ticks since boot, the ticks counted by the driver but not yet
    /// announced included.
    pub fn tick_get(&self) -> Ticks {
        cs::with(|cs| {
            let state = self.state(cs);
            state.clock.curr_tick().saturating_add(self.elapsed(state))
        })
    }

    /// The low 32 bits of [`TimeoutQueue::tick_get`].
    #[inline]
    pub fn tick_get_32(&self) -> u32 {
        self.tick_get() as u32
    }

    /// Milliseconds since boot, rounded down.
    pub fn uptime_ms(&self) -> u64 {
        conversion::ticks_to_ms_floor(self.tick_get(), self.driver.ticks_per_sec())
    }

    /// The absolute tick at which `timeout` ends, counted from now.
    ///
    /// [`Timeout::Forever`] ends at `Ticks::MAX` and [`Timeout::NoWait`] ends
    /// now; any other timeout ends at least one tick in the future.
    pub fn end_calc(&self, timeout: Timeout) -> Ticks {
        match timeout {
            Timeout::Forever => Ticks::MAX,
            Timeout::NoWait => self.tick_get(),
            Timeout::Ticks(dt) => self.tick_get().saturating_add(dt.max(1)),
        }
    }
}

impl<D, S> fmt::Debug for TimeoutQueue<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (curr_tick, pending) = cs::with(|cs| {
            let state = self.state(cs);
            (state.clock.curr_tick(), state.list.iter(cs).count())
        });

        f.debug_struct("TimeoutQueue")
            .field("curr_tick", &curr_tick)
            .field("pending", &pending)
            .field("config", &self.config)
            .finish()
    }
}
