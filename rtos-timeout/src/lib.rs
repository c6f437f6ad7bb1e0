//! Tick-driven timeout core for small real-time kernels.
//!
//! Every pending time-based wakeup (wait timeouts, software timers, time-slice
//! boundaries) is tracked in one sorted *delta list*: each [`TimeoutNode`]
//! stores the number of ticks between its own expiration and the expiration of
//! the node in front of it. A single hardware comparator, driven through a
//! [`ClockDriver`], is enough to serve any number of pending timeouts.
//!
//! Thread context registers and cancels timeouts through a [`TimeoutQueue`];
//! the timer interrupt reports elapsed ticks with
//! [`TimeoutQueue::announce`], which is the only place ticks advance and
//! callbacks fire.
//!
//! All state is guarded by [`critical_section`]. The queue never allocates:
//! nodes are owned by the caller and only linked into the queue.

#![no_std]
#![deny(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate std;

#[cfg(feature = "defmt-03")]
use defmt_03 as defmt;

mod clock;
pub mod conversion;
mod delta_list;
pub mod timeout;
pub mod timeout_queue;

pub use delta_list::{TimeoutFn, TimeoutNode};
pub use timeout::Timeout;
pub use timeout_queue::{
    CancelError, ClockDriver, Scheduler, TimeoutConfig, TimeoutQueue,
};

/// The unit of time of this crate: one tick of the kernel clock.
pub type Ticks = u64;
