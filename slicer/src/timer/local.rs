//! Real-time scheduler on a tokio `LocalSet`
//!
//! Each timer is a `spawn_local` task sleeping for the delay. Cancelling
//! aborts the task. Callbacks are `!Send`, so this must run inside a
//! `LocalSet` (or a `spawn_local`-capable current-thread runtime).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::task::AbortHandle;
use tracing::{debug, trace};

use super::{Scheduler, TimerCallback, TimerHandle};

#[derive(Default)]
struct LocalState {
    next_id: u64,
    tasks: HashMap<u64, AbortHandle>,
}

/// Scheduler backed by tokio timers on the current thread
#[derive(Clone, Default)]
pub struct LocalScheduler {
    state: Rc<RefCell<LocalState>>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        debug!("LocalScheduler::new: called");
        Self::default()
    }

    /// Number of timers armed and not yet fired
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Abort every outstanding timer
    pub fn cancel_all(&self) -> usize {
        let tasks: Vec<AbortHandle> = self.state.borrow_mut().tasks.drain().map(|(_, task)| task).collect();
        debug!(count = tasks.len(), "LocalScheduler::cancel_all: called");
        for task in &tasks {
            task.abort();
        }
        tasks.len()
    }
}

impl Scheduler for LocalScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let timer_id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            id
        };
        trace!(timer_id, ?delay, "LocalScheduler::schedule: called");

        let state = Rc::clone(&self.state);
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let armed = state.borrow_mut().tasks.remove(&timer_id).is_some();
            if armed {
                trace!(timer_id, "LocalScheduler: firing");
                callback();
            }
        });

        self.state.borrow_mut().tasks.insert(timer_id, task.abort_handle());
        TimerHandle::new(timer_id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let task = self.state.borrow_mut().tasks.remove(&handle.id());
        trace!(%handle, found = task.is_some(), "LocalScheduler::cancel: called");
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
