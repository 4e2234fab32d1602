//! One item per tick

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use super::config::SliceConfig;
use super::queue::{DrainSummary, ErrorHook, WorkQueue};
use crate::error::SchedError;
use crate::tick::TickHandle;
use crate::timer::SharedScheduler;

/// Drains a queue one item per tick, in strict FIFO order
pub struct TimeSlicer {
    scheduler: SharedScheduler,
    config: SliceConfig,
    on_error: Option<ErrorHook>,
}

impl TimeSlicer {
    pub fn new(scheduler: SharedScheduler, config: SliceConfig) -> Self {
        debug!(?config, "TimeSlicer::new: called");
        Self {
            scheduler,
            config,
            on_error: None,
        }
    }

    /// Report each failing item as it happens, in addition to the summary
    ///
    /// The hook also sees failures of runs that are later cancelled and never
    /// reach `on_complete`.
    pub fn with_error_hook(mut self, hook: impl Fn(&SchedError) + 'static) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }

    /// Process `items` one per tick, then call `on_complete` once
    ///
    /// The first item is processed one tick delay from now. A failing item is
    /// recorded in the summary and the drain moves on to the next one.
    pub fn run<T, P, C>(&self, items: impl IntoIterator<Item = T>, process: P, on_complete: C) -> TickHandle
    where
        T: 'static,
        P: FnMut(T) -> eyre::Result<()> + 'static,
        C: FnOnce(DrainSummary) + 'static,
    {
        let queue = WorkQueue::new(items, Box::new(process), Box::new(on_complete))
            .with_error_hook(self.on_error.clone());
        debug!(items = queue.len(), delay = ?self.config.tick_delay(), "TimeSlicer::run: called");

        let handle = TickHandle::new(Rc::clone(&self.scheduler));
        arm(handle.clone(), Rc::new(RefCell::new(queue)), self.config.tick_delay());
        handle
    }
}

fn arm<T: 'static>(handle: TickHandle, queue: Rc<RefCell<WorkQueue<T>>>, delay: Duration) {
    let next = handle.clone();
    handle.arm(delay, Box::new(move || tick(next, queue, delay)));
}

fn tick<T: 'static>(handle: TickHandle, queue: Rc<RefCell<WorkQueue<T>>>, delay: Duration) {
    if !handle.begin_tick() {
        return;
    }

    let drained = {
        let mut queue = queue.borrow_mut();
        queue.process_next();
        queue.is_empty()
    };

    if !drained {
        arm(handle, queue, delay);
        return;
    }

    if handle.complete() {
        let finished = queue.borrow_mut().finish(handle.ticks());
        if let Some((on_complete, summary)) = finished {
            debug!(processed = summary.processed, ticks = summary.ticks, "TimeSlicer: drained");
            on_complete(summary);
        }
    }
}
