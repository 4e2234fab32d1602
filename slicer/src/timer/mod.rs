//! Delayed-callback primitive
//!
//! Every scheduling primitive in this crate suspends only by handing a
//! callback to a [`Scheduler`] and returning. The scheduler guarantees the
//! callback runs no earlier than the requested delay, and that a cancelled
//! callback never runs.
//!
//! Two implementations are provided:
//!
//! - [`VirtualScheduler`] - deterministic virtual time, driven explicitly
//! - [`LocalScheduler`] - real time on a tokio `LocalSet`

mod local;
mod virtual_clock;

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub use local::LocalScheduler;
pub use virtual_clock::VirtualScheduler;

/// Callback handed to a scheduler; runs at most once
pub type TimerCallback = Box<dyn FnOnce() + 'static>;

/// Shared, single-threaded scheduler reference used by all primitives
pub type SharedScheduler = Rc<dyn Scheduler>;

/// Opaque handle identifying one scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw timer id, unique per scheduler instance
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Host capability to run a callback after a delay
///
/// Implementations must never invoke a callback synchronously from
/// `schedule`; callers rely on being able to finish their own bookkeeping
/// before the callback can observe it.
pub trait Scheduler {
    /// Run `callback` once, no earlier than `delay` from now
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Prevent a not-yet-fired callback from running
    ///
    /// Returns `true` if the callback was still pending. Cancelling a fired
    /// or already-cancelled handle is a no-op.
    fn cancel(&self, handle: TimerHandle) -> bool;

    /// Current time as seen by this scheduler
    fn now(&self) -> Instant;
}
