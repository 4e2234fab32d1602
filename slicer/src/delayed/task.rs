//! Single cancellable deferred action

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::timer::{SharedScheduler, TimerHandle};

/// Default delay for [`delay_task`] callers that have no better value
pub const DEFAULT_TASK_DELAY: Duration = Duration::from_millis(600);

/// Handle to a task armed by [`delay_task`]
pub struct DelayedTask {
    scheduler: SharedScheduler,
    timer: TimerHandle,
    ran: Rc<Cell<bool>>,
}

impl DelayedTask {
    /// Clear the task if it has not run yet
    ///
    /// Returns `true` if the task was cleared before running, `false` if it
    /// already ran. Safe to call any number of times.
    pub fn cancel(&self) -> bool {
        self.scheduler.cancel(self.timer);
        let cleared = !self.ran.get();
        debug!(timer = %self.timer, cleared, "DelayedTask::cancel: called");
        cleared
    }

    pub fn has_run(&self) -> bool {
        self.ran.get()
    }
}

/// Run `task` once after `delay`
pub fn delay_task(scheduler: SharedScheduler, delay: Duration, task: impl FnOnce() + 'static) -> DelayedTask {
    debug!(?delay, "delay_task: called");
    let ran = Rc::new(Cell::new(false));
    let running = Rc::clone(&ran);
    let timer = scheduler.schedule(
        delay,
        Box::new(move || {
            running.set(true);
            task();
        }),
    );
    DelayedTask { scheduler, timer, ran }
}
