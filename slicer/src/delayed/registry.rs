//! Keyed registry of one-shot delayed tasks
//!
//! Per id the lifecycle is:
//!
//! ```text
//!            add              fire
//!   Absent ───────▶ Armed ──────────▶ Finished
//!     ▲              │ ▲
//!     │ stop(forget) │ │ start
//!     │              ▼ │
//!     └──────────── Stopped
//! ```
//!
//! `Finished` is permanent for the lifetime of the registry.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SchedError;
use crate::timer::{SharedScheduler, TimerHandle};

type ActionFn<K> = Box<dyn FnOnce(&K) -> eyre::Result<()>>;
type IdCallback<K> = Box<dyn FnOnce(&K)>;
type ErrorHook = Box<dyn FnMut(SchedError)>;

/// Where an id sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Never added, or forgotten
    Absent,
    /// Pending with a live timer
    Armed,
    /// Pending, timer stopped; resumable with `start`
    Stopped,
    /// Action has run; the id can never run again
    Finished,
}

/// Result of [`DelayedTaskRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddOutcome {
    /// New task recorded and armed
    Scheduled,
    /// A stopped task for this id was replaced and armed
    Replaced,
    /// A timer for this id is already running; the new action was dropped
    AlreadyArmed,
    /// The id already ran; the new action was dropped
    AlreadyFinished,
}

impl AddOutcome {
    /// Whether the supplied action was kept
    pub fn accepted(&self) -> bool {
        matches!(self, AddOutcome::Scheduled | AddOutcome::Replaced)
    }
}

/// Options for [`DelayedTaskRegistry::start`]
pub struct StartOptions<K> {
    on_fired: Option<IdCallback<K>>,
}

impl<K> StartOptions<K> {
    pub fn new() -> Self {
        Self { on_fired: None }
    }

    /// Called with the id after the timer fired and the action ran
    pub fn on_fired(mut self, callback: impl FnOnce(&K) + 'static) -> Self {
        self.on_fired = Some(Box::new(callback));
        self
    }
}

impl<K> Default for StartOptions<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for [`DelayedTaskRegistry::stop`]
pub struct StopOptions<K> {
    forget: bool,
    on_stopped: Option<IdCallback<K>>,
}

impl<K> StopOptions<K> {
    /// Keep the action and delay so `start` can resume it
    pub fn keep() -> Self {
        Self {
            forget: false,
            on_stopped: None,
        }
    }

    /// Drop the task entirely; the id may be added again later
    pub fn forget() -> Self {
        Self {
            forget: true,
            on_stopped: None,
        }
    }

    /// Called with the id when the stop changed anything
    pub fn on_stopped(mut self, callback: impl FnOnce(&K) + 'static) -> Self {
        self.on_stopped = Some(Box::new(callback));
        self
    }
}

impl<K> Default for StopOptions<K> {
    fn default() -> Self {
        Self::keep()
    }
}

struct PendingTask<K> {
    action: ActionFn<K>,
    delay: Duration,
    timer: Option<TimerHandle>,
}

struct RegistryInner<K> {
    scheduler: SharedScheduler,
    pending: HashMap<K, PendingTask<K>>,
    finished: HashSet<K>,
    on_error: Option<ErrorHook>,
}

impl<K> Drop for RegistryInner<K> {
    fn drop(&mut self) {
        for task in self.pending.values_mut() {
            if let Some(timer) = task.timer.take() {
                self.scheduler.cancel(timer);
            }
        }
    }
}

/// Keyed set of deferred actions, each id running at most once
///
/// Clones share the same registry. Dropping the last clone cancels every
/// armed timer.
pub struct DelayedTaskRegistry<K> {
    inner: Rc<RefCell<RegistryInner<K>>>,
}

impl<K> Clone for DelayedTaskRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K> DelayedTaskRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    pub fn new(scheduler: SharedScheduler) -> Self {
        debug!("DelayedTaskRegistry::new: called");
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                scheduler,
                pending: HashMap::new(),
                finished: HashSet::new(),
                on_error: None,
            })),
        }
    }

    /// Receive failures of actions instead of only logging them
    pub fn with_error_hook(self, hook: impl FnMut(SchedError) + 'static) -> Self {
        self.inner.borrow_mut().on_error = Some(Box::new(hook));
        self
    }

    /// Record `action` for `id` and arm it to run after `delay`
    ///
    /// Finished ids and ids with a running timer are left untouched.
    pub fn add(&self, id: K, delay: Duration, action: impl FnOnce(&K) -> eyre::Result<()> + 'static) -> AddOutcome {
        debug!(?id, ?delay, "DelayedTaskRegistry::add: called");
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            if inner.finished.contains(&id) {
                debug!(?id, "DelayedTaskRegistry::add: already finished, ignoring");
                return AddOutcome::AlreadyFinished;
            }
            let outcome = match inner.pending.get(&id) {
                Some(task) if task.timer.is_some() => {
                    debug!(?id, "DelayedTaskRegistry::add: already armed, ignoring");
                    return AddOutcome::AlreadyArmed;
                }
                Some(_) => AddOutcome::Replaced,
                None => AddOutcome::Scheduled,
            };
            inner.pending.insert(
                id.clone(),
                PendingTask {
                    action: Box::new(action),
                    delay,
                    timer: None,
                },
            );
            outcome
        };

        self.start(&id, StartOptions::new());
        outcome
    }

    /// Arm the timer of a pending task that has none running
    ///
    /// Returns `false` without doing anything when the id has no pending
    /// task or its timer is already running.
    pub fn start(&self, id: &K, options: StartOptions<K>) -> bool {
        let mut inner = self.inner.borrow_mut();
        let scheduler = Rc::clone(&inner.scheduler);
        let Some(task) = inner.pending.get_mut(id) else {
            debug!(?id, "DelayedTaskRegistry::start: no pending task");
            return false;
        };
        if task.timer.is_some() {
            debug!(?id, "DelayedTaskRegistry::start: already armed");
            return false;
        }

        let weak: Weak<RefCell<RegistryInner<K>>> = Rc::downgrade(&self.inner);
        let fired_id = id.clone();
        let on_fired = options.on_fired;
        let timer = scheduler.schedule(
            task.delay,
            Box::new(move || {
                // Registry dropped: nothing left to run
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                DelayedTaskRegistry { inner }.fire(&fired_id, on_fired);
            }),
        );
        debug!(?id, delay = ?task.delay, %timer, "DelayedTaskRegistry::start: armed");
        task.timer = Some(timer);
        true
    }

    /// Cancel the timer of `id`, optionally forgetting the task
    pub fn stop(&self, id: &K, options: StopOptions<K>) -> bool {
        let StopOptions { forget, on_stopped } = options;
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let scheduler = Rc::clone(&inner.scheduler);
            let Some(task) = inner.pending.get_mut(id) else {
                debug!(?id, "DelayedTaskRegistry::stop: no pending task");
                return false;
            };
            let mut changed = false;
            if let Some(timer) = task.timer.take() {
                scheduler.cancel(timer);
                changed = true;
            }
            if forget {
                inner.pending.remove(id);
                changed = true;
            }
            changed
        };

        debug!(?id, forget, changed, "DelayedTaskRegistry::stop: done");
        if changed {
            if let Some(on_stopped) = on_stopped {
                on_stopped(id);
            }
        }
        changed
    }

    /// Run the pending task for `id` right away instead of waiting
    pub fn run_now(&self, id: &K) -> bool {
        debug!(?id, "DelayedTaskRegistry::run_now: called");
        {
            let mut inner = self.inner.borrow_mut();
            let scheduler = Rc::clone(&inner.scheduler);
            if let Some(timer) = inner.pending.get_mut(id).and_then(|task| task.timer.take()) {
                scheduler.cancel(timer);
            }
        }
        self.fire(id, None)
    }

    /// Cancel every timer and drop every pending task
    ///
    /// Finished ids stay finished.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        let scheduler = Rc::clone(&inner.scheduler);
        let count = inner.pending.len();
        for (_, task) in inner.pending.drain() {
            if let Some(timer) = task.timer {
                scheduler.cancel(timer);
            }
        }
        debug!(count, "DelayedTaskRegistry::clear: dropped pending tasks");
        count
    }

    pub fn state(&self, id: &K) -> TaskState {
        let inner = self.inner.borrow();
        if inner.finished.contains(id) {
            return TaskState::Finished;
        }
        match inner.pending.get(id) {
            Some(task) if task.timer.is_some() => TaskState::Armed,
            Some(_) => TaskState::Stopped,
            None => TaskState::Absent,
        }
    }

    pub fn is_finished(&self, id: &K) -> bool {
        self.inner.borrow().finished.contains(id)
    }

    /// Tasks added and not yet run or forgotten
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn finished_len(&self) -> usize {
        self.inner.borrow().finished.len()
    }

    /// Mark `id` finished, drop its record, then run its action
    ///
    /// No borrow is held while the action runs, so the action may call back
    /// into the registry; for its own id it will find `Finished`.
    fn fire(&self, id: &K, on_fired: Option<IdCallback<K>>) -> bool {
        let task = {
            let mut inner = self.inner.borrow_mut();
            if !inner.pending.contains_key(id) {
                debug!(?id, "DelayedTaskRegistry::fire: nothing pending");
                return false;
            }
            inner.finished.insert(id.clone());
            inner.pending.remove(id)
        };
        let Some(task) = task else {
            return false;
        };

        debug!(?id, "DelayedTaskRegistry::fire: running action");
        if let Err(report) = (task.action)(id) {
            self.report(SchedError::action(id, &report));
        }
        if let Some(on_fired) = on_fired {
            on_fired(id);
        }
        true
    }

    fn report(&self, err: SchedError) {
        warn!(error = %err, "DelayedTaskRegistry: action failed");
        let hook = self.inner.borrow_mut().on_error.take();
        if let Some(mut hook) = hook {
            hook(err);
            let mut inner = self.inner.borrow_mut();
            if inner.on_error.is_none() {
                inner.on_error = Some(hook);
            }
        }
    }
}

impl<K> fmt::Debug for DelayedTaskRegistry<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DelayedTaskRegistry")
            .field("pending", &inner.pending.keys().collect::<Vec<_>>())
            .field("finished", &inner.finished)
            .finish()
    }
}
