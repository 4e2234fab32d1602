//! As many items per tick as the time budget allows

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use super::config::BatchConfig;
use super::queue::{DrainSummary, ErrorHook, WorkQueue};
use crate::error::SchedError;
use crate::tick::TickHandle;
use crate::timer::SharedScheduler;

/// Drains a queue greedily within a per-tick time budget
///
/// The budget is checked after each item, never before, so every tick
/// processes at least one item and an item that overruns the budget is
/// always processed to the end.
pub struct BatchSlicer {
    scheduler: SharedScheduler,
    config: BatchConfig,
    on_error: Option<ErrorHook>,
}

impl BatchSlicer {
    pub fn new(scheduler: SharedScheduler, config: BatchConfig) -> Self {
        debug!(?config, "BatchSlicer::new: called");
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

    /// Process `items` in budgeted batches, then call `on_complete` once
    pub fn run<T, P, C>(&self, items: impl IntoIterator<Item = T>, process: P, on_complete: C) -> TickHandle
    where
        T: 'static,
        P: FnMut(T) -> eyre::Result<()> + 'static,
        C: FnOnce(DrainSummary) + 'static,
    {
        let queue = WorkQueue::new(items, Box::new(process), Box::new(on_complete))
            .with_error_hook(self.on_error.clone());
        debug!(items = queue.len(), config = ?self.config, "BatchSlicer::run: called");

        let handle = TickHandle::new(Rc::clone(&self.scheduler));
        arm(handle.clone(), Rc::new(RefCell::new(queue)), self.config.clone());
        handle
    }
}

fn arm<T: 'static>(handle: TickHandle, queue: Rc<RefCell<WorkQueue<T>>>, config: BatchConfig) {
    let next = handle.clone();
    let delay = config.tick_delay();
    handle.arm(delay, Box::new(move || tick(next, queue, config)));
}

fn tick<T: 'static>(handle: TickHandle, queue: Rc<RefCell<WorkQueue<T>>>, config: BatchConfig) {
    if !handle.begin_tick() {
        return;
    }

    let (batch, drained) = {
        let mut queue = queue.borrow_mut();
        let batch = process_batch(&mut queue, &handle, config.per_tick_budget());
        (batch, queue.is_empty())
    };
    trace!(tick = handle.ticks(), batch, drained, "BatchSlicer: tick done");

    if !drained {
        arm(handle, queue, config);
        return;
    }

    if handle.complete() {
        let finished = queue.borrow_mut().finish(handle.ticks());
        if let Some((on_complete, summary)) = finished {
            debug!(processed = summary.processed, ticks = summary.ticks, "BatchSlicer: drained");
            on_complete(summary);
        }
    }
}

/// Process items until the queue empties, the run is cancelled or the budget
/// is spent; returns how many items were processed
fn process_batch<T>(queue: &mut WorkQueue<T>, handle: &TickHandle, budget: Duration) -> usize {
    let started = handle.now();
    let mut batch = 0;
    loop {
        if queue.process_next() {
            batch += 1;
        }
        if queue.is_empty() || !handle.is_active() {
            break;
        }
        if handle.now().saturating_duration_since(started) >= budget {
            break;
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::VirtualScheduler;
    use std::cell::Cell;

    fn batch(sched: &Rc<VirtualScheduler>, delay_ms: u64, budget_ms: u64) -> BatchSlicer {
        BatchSlicer::new(
            sched.clone(),
            BatchConfig::new(Duration::from_millis(delay_ms), Duration::from_millis(budget_ms)),
        )
    }

    #[test]
    fn test_zero_budget_still_makes_progress() {
        let sched = Rc::new(VirtualScheduler::new());
        let processed = Rc::new(Cell::new(0usize));
        let completions = Rc::new(Cell::new(0));

        let count = Rc::clone(&processed);
        let done = Rc::clone(&completions);
        let handle = batch(&sched, 25, 0).run(
            0..1000,
            move |_| {
                count.set(count.get() + 1);
                Ok(())
            },
            move |summary| {
                assert_eq!(summary.processed, 1000);
                done.set(done.get() + 1);
            },
        );

        // One item per tick with a zero budget
        let mut ticks = 0;
        while sched.run_next() {
            ticks += 1;
            assert_eq!(processed.get(), ticks);
        }

        assert_eq!(processed.get(), 1000);
        assert_eq!(completions.get(), 1);
        assert_eq!(handle.ticks(), 1000);
    }

    #[test]
    fn test_instant_items_fit_in_one_tick() {
        let sched = Rc::new(VirtualScheduler::new());
        let processed = Rc::new(Cell::new(0usize));

        let count = Rc::clone(&processed);
        let handle = batch(&sched, 25, 50).run(
            0..1000,
            move |_| {
                count.set(count.get() + 1);
                Ok(())
            },
            |_| {},
        );

        sched.run_until_idle();
        assert_eq!(processed.get(), 1000);
        assert_eq!(handle.ticks(), 1);
    }

    #[test]
    fn test_budget_splits_work_across_ticks() {
        let sched = Rc::new(VirtualScheduler::new());
        let per_tick = Rc::new(RefCell::new(Vec::new()));
        let last_tick = Rc::new(Cell::new(0u64));

        let sched2 = Rc::clone(&sched);
        let counts = Rc::clone(&per_tick);
        let seen_tick = Rc::clone(&last_tick);
        let handle_slot: Rc<RefCell<Option<TickHandle>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&handle_slot);
        let handle = batch(&sched, 25, 50).run(
            0..10,
            move |_| {
                // Each item takes 20ms: budget of 50ms fits three items
                sched2.elapse(Duration::from_millis(20));
                let tick = slot.borrow().as_ref().map(|h| h.ticks()).unwrap_or(0);
                if tick != seen_tick.get() {
                    seen_tick.set(tick);
                    counts.borrow_mut().push(0);
                }
                if let Some(last) = counts.borrow_mut().last_mut() {
                    *last += 1;
                }
                Ok(())
            },
            |_| {},
        );
        *handle_slot.borrow_mut() = Some(handle.clone());

        sched.run_until_idle();
        assert_eq!(*per_tick.borrow(), vec![3, 3, 3, 1]);
        assert_eq!(handle.ticks(), 4);
    }

    #[test]
    fn test_overrunning_item_is_fully_processed() {
        let sched = Rc::new(VirtualScheduler::new());
        let finished_items = Rc::new(RefCell::new(Vec::new()));

        let sched2 = Rc::clone(&sched);
        let finished = Rc::clone(&finished_items);
        let handle = batch(&sched, 10, 5).run(
            vec!["slow", "fast"],
            move |name| {
                if name == "slow" {
                    sched2.elapse(Duration::from_millis(40));
                }
                finished.borrow_mut().push(name);
                Ok(())
            },
            |_| {},
        );

        assert!(sched.run_next());
        assert_eq!(*finished_items.borrow(), vec!["slow"]);

        sched.run_until_idle();
        assert_eq!(*finished_items.borrow(), vec!["slow", "fast"]);
        assert_eq!(handle.ticks(), 2);
    }

    #[test]
    fn test_cancel_between_ticks() {
        let sched = Rc::new(VirtualScheduler::new());
        let processed = Rc::new(Cell::new(0usize));
        let completed = Rc::new(Cell::new(false));

        let count = Rc::clone(&processed);
        let done = Rc::clone(&completed);
        let handle = batch(&sched, 10, 0).run(
            0..5,
            move |_| {
                count.set(count.get() + 1);
                Ok(())
            },
            move |_| done.set(true),
        );

        sched.run_next();
        sched.run_next();
        handle.cancel();
        sched.run_until_idle();

        assert_eq!(processed.get(), 2);
        assert!(!completed.get());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_failures_reported_in_summary() {
        let sched = Rc::new(VirtualScheduler::new());
        let summary_slot = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&summary_slot);
        batch(&sched, 1, 50).run(
            0..6,
            |n| {
                if n % 2 == 1 {
                    eyre::bail!("odd item {}", n);
                }
                Ok(())
            },
            move |summary| *slot.borrow_mut() = Some(summary),
        );

        sched.run_until_idle();
        let summary = summary_slot.borrow_mut().take().expect("drain completed");
        assert_eq!(summary.processed, 6);
        assert_eq!(summary.succeeded(), 3);
        let indexes: Vec<_> = summary.failures.iter().filter_map(|f| f.item_index()).collect();
        assert_eq!(indexes, vec![1, 3, 5]);
    }

    #[test]
    fn test_process_batch_counts_only_processed_items() {
        let sched = Rc::new(VirtualScheduler::new());
        let handle = TickHandle::new(sched.clone());

        let mut empty = WorkQueue::new(Vec::<u32>::new(), Box::new(|_| Ok(())), Box::new(|_| {}));
        assert_eq!(process_batch(&mut empty, &handle, Duration::from_millis(50)), 0);

        let mut three = WorkQueue::new(vec![1, 2, 3], Box::new(|_| Ok(())), Box::new(|_| {}));
        assert_eq!(process_batch(&mut three, &handle, Duration::from_millis(50)), 3);
        assert!(three.is_empty());
    }

    #[test]
    fn test_error_hook_reports_failures_of_cancelled_run() {
        let sched = Rc::new(VirtualScheduler::new());
        let reported = Rc::new(RefCell::new(Vec::new()));
        let completed = Rc::new(Cell::new(false));

        let sink = Rc::clone(&reported);
        let done = Rc::clone(&completed);
        let handle = batch(&sched, 1, 0)
            .with_error_hook(move |err| sink.borrow_mut().push(err.to_string()))
            .run(
                0..10,
                |n| if n == 0 { Err(eyre::eyre!("broken")) } else { Ok(()) },
                move |_| done.set(true),
            );

        sched.run_next();
        handle.cancel();
        sched.run_until_idle();

        assert!(!completed.get());
        assert_eq!(*reported.borrow(), vec!["Processing item 0 failed: broken".to_string()]);
    }
}
