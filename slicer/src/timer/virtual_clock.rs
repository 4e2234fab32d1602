//! Deterministic scheduler on virtual time
//!
//! Time only advances when the driver asks it to. Timers fire in
//! (deadline, arm order) order, so two runs of the same program produce the
//! same sequence of callbacks.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{Scheduler, TimerCallback, TimerHandle};

/// Heap entry; the callback itself lives in `VirtualState::callbacks`
#[derive(Debug)]
struct VirtualTimer {
    deadline: Duration,
    timer_id: u64,
}

impl Eq for VirtualTimer {}

impl PartialEq for VirtualTimer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.timer_id == other.timer_id
    }
}

impl Ord for VirtualTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest deadline first, then lowest timer id
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.timer_id.cmp(&self.timer_id))
    }
}

impl PartialOrd for VirtualTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct VirtualState {
    elapsed: Duration,
    next_id: u64,
    heap: BinaryHeap<VirtualTimer>,
    /// Pending callbacks; a heap entry without a callback was cancelled
    callbacks: HashMap<u64, TimerCallback>,
    fired: u64,
}

/// Scheduler driven by explicit calls instead of a real clock
///
/// ```ignore
/// let sched = Rc::new(VirtualScheduler::new());
/// sched.schedule(Duration::from_millis(10), Box::new(|| println!("fired")));
/// sched.advance(Duration::from_millis(10)); // prints "fired"
/// ```
pub struct VirtualScheduler {
    epoch: Instant,
    state: RefCell<VirtualState>,
}

impl VirtualScheduler {
    /// Create a scheduler whose virtual clock starts at zero
    pub fn new() -> Self {
        debug!("VirtualScheduler::new: called");
        Self {
            epoch: Instant::now(),
            state: RefCell::new(VirtualState::default()),
        }
    }

    /// Virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        self.state.borrow().elapsed
    }

    /// Number of callbacks still waiting to fire
    pub fn pending(&self) -> usize {
        self.state.borrow().callbacks.len()
    }

    /// Total callbacks fired so far
    pub fn fired(&self) -> u64 {
        self.state.borrow().fired
    }

    /// Move the clock forward without firing anything
    ///
    /// Callbacks use this to simulate work that takes time.
    pub fn elapse(&self, duration: Duration) {
        trace!(?duration, "VirtualScheduler::elapse: called");
        self.state.borrow_mut().elapsed += duration;
    }

    /// Fire the earliest pending callback, jumping the clock to its deadline
    ///
    /// Returns `false` when nothing is pending.
    pub fn run_next(&self) -> bool {
        self.fire_next(None)
    }

    /// Fire callbacks until none are pending; returns how many fired
    pub fn run_until_idle(&self) -> usize {
        debug!("VirtualScheduler::run_until_idle: called");
        let mut count = 0;
        while self.fire_next(None) {
            count += 1;
        }
        debug!(count, "VirtualScheduler::run_until_idle: idle");
        count
    }

    /// Advance the clock by `duration`, firing every callback that falls due
    ///
    /// Callbacks armed while advancing also fire if their deadline is within
    /// the window. Returns how many fired.
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.elapsed() + duration;
        debug!(?duration, ?target, "VirtualScheduler::advance: called");
        let mut count = 0;
        while self.fire_next(Some(target)) {
            count += 1;
        }
        let mut state = self.state.borrow_mut();
        if state.elapsed < target {
            state.elapsed = target;
        }
        count
    }

    fn fire_next(&self, limit: Option<Duration>) -> bool {
        let (timer_id, callback) = {
            let mut state = self.state.borrow_mut();
            loop {
                let Some(next) = state.heap.peek() else {
                    return false;
                };
                if limit.is_some_and(|limit| next.deadline > limit) {
                    return false;
                }
                let Some(timer) = state.heap.pop() else {
                    return false;
                };
                if let Some(callback) = state.callbacks.remove(&timer.timer_id) {
                    if state.elapsed < timer.deadline {
                        state.elapsed = timer.deadline;
                    }
                    state.fired += 1;
                    break (timer.timer_id, callback);
                }
                trace!(timer_id = timer.timer_id, "VirtualScheduler::fire_next: skipping cancelled timer");
            }
        };
        trace!(timer_id, "VirtualScheduler::fire_next: firing");
        callback();
        true
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let timer_id = state.next_id;
        state.next_id += 1;
        let deadline = state.elapsed + delay;
        trace!(timer_id, ?delay, ?deadline, "VirtualScheduler::schedule: called");
        state.heap.push(VirtualTimer { deadline, timer_id });
        state.callbacks.insert(timer_id, callback);
        TimerHandle::new(timer_id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        // The callback may own state whose drop cancels other timers
        let callback = self.state.borrow_mut().callbacks.remove(&handle.id());
        let removed = callback.is_some();
        trace!(%handle, removed, "VirtualScheduler::cancel: called");
        drop(callback);
        removed
    }

    fn now(&self) -> Instant {
        self.epoch + self.elapsed()
    }
}
