//! Value animator implementation

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::config::AnimateConfig;
use crate::error::SchedError;
use crate::tick::TickHandle;
use crate::timer::SharedScheduler;

/// One sample of an animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frame {
    /// Fraction of the duration elapsed, in `[0, 1]`
    pub percent: f64,
    /// Interpolated value at `percent`
    pub value: f64,
}

impl Frame {
    pub fn is_complete(&self) -> bool {
        self.percent >= 1.0
    }
}

/// Linear interpolation from `from` to `to` after `elapsed` of `duration`
///
/// A zero duration is complete immediately. A complete frame carries
/// exactly `to`.
pub fn interpolate(from: f64, to: f64, duration: Duration, elapsed: Duration) -> Frame {
    let remaining = duration.saturating_sub(elapsed);
    let percent = if duration.is_zero() {
        1.0
    } else {
        1.0 - remaining.as_secs_f64() / duration.as_secs_f64()
    };

    if percent >= 1.0 {
        return Frame { percent: 1.0, value: to };
    }
    Frame {
        percent,
        value: from + (to - from) * percent,
    }
}

/// Immutable for the animation's lifetime, apart from the callbacks
struct Motion {
    from: f64,
    to: f64,
    duration: Duration,
    started_at: Instant,
    on_step: Box<dyn FnMut(f64)>,
    on_done: Option<Box<dyn FnOnce(f64)>>,
}

impl Motion {
    /// Sample from wall-clock elapsed time, so late ticks do not drift
    fn frame(&self, now: Instant) -> Frame {
        interpolate(
            self.from,
            self.to,
            self.duration,
            now.saturating_duration_since(self.started_at),
        )
    }
}

/// Drives a scalar from a start to an end value over a fixed duration
pub struct ValueAnimator {
    scheduler: SharedScheduler,
    config: AnimateConfig,
}

impl ValueAnimator {
    pub fn new(scheduler: SharedScheduler, config: AnimateConfig) -> Self {
        debug!(?config, "ValueAnimator::new: called");
        Self { scheduler, config }
    }

    /// Start animating `from` to `to` over `duration`
    ///
    /// `on_step` receives every intermediate value; `on_done` receives the
    /// final value exactly once, unless the returned handle is cancelled
    /// first.
    pub fn start<S, D>(
        &self,
        from: f64,
        to: f64,
        duration: Duration,
        on_step: S,
        on_done: D,
    ) -> Result<TickHandle, SchedError>
    where
        S: FnMut(f64) + 'static,
        D: FnOnce(f64) + 'static,
    {
        debug!(from, to, ?duration, "ValueAnimator::start: called");
        if !from.is_finite() || !to.is_finite() {
            return Err(SchedError::InvalidConfig(format!(
                "animation endpoints must be finite, got {} -> {}",
                from, to
            )));
        }

        let motion = Motion {
            from,
            to,
            duration,
            started_at: self.scheduler.now(),
            on_step: Box::new(on_step),
            on_done: Some(Box::new(on_done)),
        };

        let handle = TickHandle::new(Rc::clone(&self.scheduler));
        arm(handle.clone(), Rc::new(RefCell::new(motion)), self.config.tick_interval());
        Ok(handle)
    }
}

fn arm(handle: TickHandle, motion: Rc<RefCell<Motion>>, interval: Duration) {
    let next = handle.clone();
    handle.arm(interval, Box::new(move || tick(next, motion, interval)));
}

fn tick(handle: TickHandle, motion: Rc<RefCell<Motion>>, interval: Duration) {
    if !handle.begin_tick() {
        return;
    }

    let frame = motion.borrow().frame(handle.now());
    if !frame.is_complete() {
        (motion.borrow_mut().on_step)(frame.value);
        arm(handle, motion, interval);
        return;
    }

    if handle.complete() {
        let on_done = motion.borrow_mut().on_done.take();
        if let Some(on_done) = on_done {
            debug!(value = frame.value, ticks = handle.ticks(), "ValueAnimator: done");
            on_done(frame.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::VirtualScheduler;
    use std::cell::Cell;

    fn animator(sched: &Rc<VirtualScheduler>) -> ValueAnimator {
        ValueAnimator::new(sched.clone(), AnimateConfig::default())
    }

    #[test]
    fn test_interpolate_midpoint() {
        let frame = interpolate(0.0, 100.0, Duration::from_millis(500), Duration::from_millis(250));
        assert!((frame.percent - 0.5).abs() < 1e-9);
        assert!((frame.value - 50.0).abs() < 1e-9);
        assert!(!frame.is_complete());
    }

    #[test]
    fn test_interpolate_past_end_clamps() {
        let frame = interpolate(10.0, -10.0, Duration::from_millis(100), Duration::from_secs(3));
        assert_eq!(frame, Frame { percent: 1.0, value: -10.0 });
    }

    #[test]
    fn test_interpolate_zero_duration() {
        let frame = interpolate(1.0, 2.0, Duration::ZERO, Duration::ZERO);
        assert!(frame.is_complete());
        assert_eq!(frame.value, 2.0);
    }

    #[test]
    fn test_steps_monotonic_and_done_once() {
        let sched = Rc::new(VirtualScheduler::new());
        let steps = Rc::new(RefCell::new(Vec::new()));
        let done_values = Rc::new(RefCell::new(Vec::new()));

        let recorded = Rc::clone(&steps);
        let done = Rc::clone(&done_values);
        let handle = animator(&sched)
            .start(
                0.0,
                100.0,
                Duration::from_millis(500),
                move |v| recorded.borrow_mut().push(v),
                move |v| done.borrow_mut().push(v),
            )
            .unwrap();

        sched.run_until_idle();

        let steps = steps.borrow();
        assert!(!steps.is_empty());
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        assert!(steps.iter().all(|v| (0.0..=100.0).contains(v)));

        let done_values = done_values.borrow();
        assert_eq!(done_values.len(), 1);
        assert!((done_values[0] - 100.0).abs() < 1e-9);
        assert!(handle.is_finished());

        // Never done before the full duration has elapsed
        assert!(sched.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn test_late_ticks_do_not_drift() {
        let sched = Rc::new(VirtualScheduler::new());
        let steps = Rc::new(RefCell::new(Vec::new()));

        let recorded = Rc::clone(&steps);
        animator(&sched)
            .start(
                0.0,
                1000.0,
                Duration::from_millis(1000),
                move |v| recorded.borrow_mut().push(v),
                |_| {},
            )
            .unwrap();

        // Host stalls for 300ms before the first tick can run
        sched.elapse(Duration::from_millis(300));
        sched.run_next();

        let first = steps.borrow()[0];
        assert!((first - 300.0).abs() < 1e-6, "first step was {}", first);
    }

    #[test]
    fn test_cancel_before_end_stops_callbacks() {
        let sched = Rc::new(VirtualScheduler::new());
        let step_count = Rc::new(Cell::new(0));
        let done_called = Rc::new(Cell::new(false));

        let count = Rc::clone(&step_count);
        let done = Rc::clone(&done_called);
        let handle = animator(&sched)
            .start(
                0.0,
                100.0,
                Duration::from_millis(500),
                move |_| count.set(count.get() + 1),
                move |_| done.set(true),
            )
            .unwrap();

        sched.advance(Duration::from_millis(100));
        let seen = step_count.get();
        assert!(seen > 0);

        assert!(handle.cancel());
        assert!(!handle.cancel());
        sched.run_until_idle();

        assert_eq!(step_count.get(), seen);
        assert!(!done_called.get());
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_cancel_after_completion_is_harmless() {
        let sched = Rc::new(VirtualScheduler::new());
        let done_count = Rc::new(Cell::new(0));

        let done = Rc::clone(&done_count);
        let handle = animator(&sched)
            .start(5.0, 6.0, Duration::from_millis(50), |_| {}, move |_| done.set(done.get() + 1))
            .unwrap();

        sched.run_until_idle();
        assert!(!handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(done_count.get(), 1);
    }

    #[test]
    fn test_cancel_from_step_callback() {
        let sched = Rc::new(VirtualScheduler::new());
        let slot: Rc<RefCell<Option<TickHandle>>> = Rc::new(RefCell::new(None));
        let step_count = Rc::new(Cell::new(0));

        let slot2 = Rc::clone(&slot);
        let count = Rc::clone(&step_count);
        let handle = animator(&sched)
            .start(
                0.0,
                1.0,
                Duration::from_secs(1),
                move |_| {
                    count.set(count.get() + 1);
                    if let Some(handle) = slot2.borrow().as_ref() {
                        handle.cancel();
                    }
                },
                |_| panic!("cancelled animation must not finish"),
            )
            .unwrap();
        *slot.borrow_mut() = Some(handle);

        sched.run_until_idle();
        assert_eq!(step_count.get(), 1);
    }

    #[test]
    fn test_decreasing_range() {
        let sched = Rc::new(VirtualScheduler::new());
        let steps = Rc::new(RefCell::new(Vec::new()));
        let final_value = Rc::new(Cell::new(f64::NAN));

        let recorded = Rc::clone(&steps);
        let last = Rc::clone(&final_value);
        animator(&sched)
            .start(
                1.0,
                0.0,
                Duration::from_millis(200),
                move |v| recorded.borrow_mut().push(v),
                move |v| last.set(v),
            )
            .unwrap();

        sched.run_until_idle();
        assert!(steps.borrow().windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(final_value.get(), 0.0);
    }

    #[test]
    fn test_non_finite_endpoint_rejected() {
        let sched = Rc::new(VirtualScheduler::new());
        let result = animator(&sched).start(f64::NAN, 1.0, Duration::from_millis(10), |_| {}, |_| {});

        assert!(matches!(result, Err(SchedError::InvalidConfig(_))));
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_zero_duration_finishes_on_first_tick() {
        let sched = Rc::new(VirtualScheduler::new());
        let done = Rc::new(Cell::new(None));

        let slot = Rc::clone(&done);
        animator(&sched)
            .start(3.0, 7.0, Duration::ZERO, |_| panic!("no steps expected"), move |v| slot.set(Some(v)))
            .unwrap();

        assert_eq!(sched.run_until_idle(), 1);
        assert_eq!(done.get(), Some(7.0));
    }
}
