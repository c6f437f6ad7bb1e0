//! A simulated tick clock for driving a [`TimeoutQueue`] from tests.
//!
//! To run these tests, you need to activate the `critical-section/std` feature.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rtos_timeout::{ClockDriver, Scheduler, Ticks, TimeoutConfig, TimeoutQueue};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts ticks that have not been announced yet and records every deadline
/// the queue programs.
pub struct SimClock {
    hz: u32,
    elapsed: AtomicU64,
    deadlines: Mutex<Vec<(Option<Ticks>, bool)>>,
}

impl SimClock {
    pub const fn new(hz: u32) -> Self {
        Self {
            hz,
            elapsed: AtomicU64::new(0),
            deadlines: Mutex::new(Vec::new()),
        }
    }

    /// Let `ticks` pass without announcing them.
    pub fn advance(&self, ticks: Ticks) {
        self.elapsed.fetch_add(ticks, Ordering::SeqCst);
    }

    /// The latest `(ticks, idle)` passed to `set_next_deadline`.
    pub fn last_deadline(&self) -> Option<(Option<Ticks>, bool)> {
        self.deadlines.lock().last().copied()
    }

    pub fn deadline_count(&self) -> usize {
        self.deadlines.lock().len()
    }
}

impl ClockDriver for SimClock {
    fn elapsed_ticks(&self) -> Ticks {
        self.elapsed.load(Ordering::SeqCst)
    }

    fn set_next_deadline(&self, ticks: Option<Ticks>, idle: bool) {
        self.deadlines.lock().push((ticks, idle));
    }

    fn ticks_per_sec(&self) -> u32 {
        self.hz
    }
}

/// A scheduler with an adjustable time slice.
pub struct SimScheduler {
    slice: Mutex<Option<Ticks>>,
    announced: Mutex<Vec<Ticks>>,
}

impl SimScheduler {
    pub const fn new() -> Self {
        Self {
            slice: Mutex::new(None),
            announced: Mutex::new(Vec::new()),
        }
    }

    pub fn set_slice(&self, slice: Option<Ticks>) {
        *self.slice.lock() = slice;
    }

    pub fn announced(&self) -> Vec<Ticks> {
        self.announced.lock().clone()
    }
}

impl Scheduler for SimScheduler {
    fn announce(&self, ticks: Ticks) {
        self.announced.lock().push(ticks);
    }

    fn slice_ticks(&self) -> Option<Ticks> {
        *self.slice.lock()
    }
}

/// What the timer interrupt does: hand everything the clock counted so far
/// to the queue.
pub fn timer_interrupt<S: Scheduler>(queue: &TimeoutQueue<SimClock, S>) {
    let ticks = queue.driver().elapsed.swap(0, Ordering::SeqCst);
    queue.announce(ticks);
}

/// Advance the clock by `ticks` and take the timer interrupt.
pub fn tick<S: Scheduler>(queue: &TimeoutQueue<SimClock, S>, ticks: Ticks) {
    queue.driver().advance(ticks);
    timer_interrupt(queue);
}

/// A queue on a 100 Hz simulated clock.
pub const fn sim_queue(config: TimeoutConfig) -> TimeoutQueue<SimClock> {
    TimeoutQueue::new(SimClock::new(100), config)
}
