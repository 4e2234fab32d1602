//! Cancel token shared by the self-rescheduling primitives
//!
//! A [`TickHandle`] tracks the one pending tick of a time slicer, batch
//! slicer or animation. Ticks are strictly sequential: a new tick is armed
//! only after the current one has finished its own work, so at most one
//! timer is ever outstanding per handle.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::timer::{SharedScheduler, TimerCallback, TimerHandle};

struct TickState {
    scheduler: SharedScheduler,
    timer: Cell<Option<TimerHandle>>,
    cancelled: Cell<bool>,
    finished: Cell<bool>,
    ticks: Cell<u64>,
}

/// Handle to a running slicer or animation
///
/// Cheap to clone; all clones control the same run. Cancelling is
/// idempotent and safe after the run has completed.
#[derive(Clone)]
pub struct TickHandle {
    state: Rc<TickState>,
}

impl TickHandle {
    pub(crate) fn new(scheduler: SharedScheduler) -> Self {
        Self {
            state: Rc::new(TickState {
                scheduler,
                timer: Cell::new(None),
                cancelled: Cell::new(false),
                finished: Cell::new(false),
                ticks: Cell::new(0),
            }),
        }
    }

    /// Stop all future ticks
    ///
    /// Work already done is not undone, and the completion callback will
    /// not run. Returns `true` only for the call that actually stopped a
    /// live run.
    pub fn cancel(&self) -> bool {
        if self.state.finished.get() || self.state.cancelled.get() {
            debug!("TickHandle::cancel: already stopped");
            return false;
        }
        self.state.cancelled.set(true);
        if let Some(timer) = self.state.timer.take() {
            self.state.scheduler.cancel(timer);
        }
        debug!(ticks = self.state.ticks.get(), "TickHandle::cancel: cancelled");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    /// True once the run completed naturally
    pub fn is_finished(&self) -> bool {
        self.state.finished.get()
    }

    /// True while more ticks may still fire
    pub fn is_active(&self) -> bool {
        !self.state.finished.get() && !self.state.cancelled.get()
    }

    /// Number of ticks that have started so far
    pub fn ticks(&self) -> u64 {
        self.state.ticks.get()
    }

    pub(crate) fn now(&self) -> Instant {
        self.state.scheduler.now()
    }

    /// Arm the next tick unless the run was cancelled
    pub(crate) fn arm(&self, delay: Duration, callback: TimerCallback) {
        if !self.is_active() {
            trace!("TickHandle::arm: run stopped, not arming");
            return;
        }
        let timer = self.state.scheduler.schedule(delay, callback);
        self.state.timer.set(Some(timer));
    }

    /// Enter a tick; returns `false` if the run was stopped meanwhile
    pub(crate) fn begin_tick(&self) -> bool {
        self.state.timer.set(None);
        if !self.is_active() {
            return false;
        }
        self.state.ticks.set(self.state.ticks.get() + 1);
        true
    }

    /// Mark the run complete; returns `false` if it was cancelled first
    pub(crate) fn complete(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state.finished.set(true);
        true
    }
}

impl fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHandle")
            .field("ticks", &self.state.ticks.get())
            .field("cancelled", &self.state.cancelled.get())
            .field("finished", &self.state.finished.get())
            .finish()
    }
}
