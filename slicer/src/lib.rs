//! Slicer - cooperative time-sliced task scheduling
//!
//! Primitives for processing large workloads or deferred actions without
//! monopolising a single thread of control. Every primitive suspends only by
//! handing a callback to a [`Scheduler`] and returning; nothing blocks and
//! nothing runs in parallel.
//!
//! # Primitives
//!
//! - [`TimeSlicer`] - one item per tick, strict FIFO
//! - [`BatchSlicer`] - as many items per tick as a time budget allows
//! - [`ValueAnimator`] - a scalar moved from `from` to `to` over a duration
//! - [`DelayedTaskRegistry`] - keyed one-shot actions, each id runs once ever
//! - [`delay_task`] - a single cancellable deferred action
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use slicer::{SliceConfig, TimeSlicer, VirtualScheduler};
//!
//! let sched = Rc::new(VirtualScheduler::new());
//! let slicer = TimeSlicer::new(sched.clone(), SliceConfig::default());
//! slicer.run(vec![1, 2, 3], |n| { println!("{n}"); Ok(()) }, |summary| {
//!     println!("done: {}", summary.processed);
//! });
//! sched.run_until_idle();
//! ```

pub mod animate;
pub mod cli;
pub mod config;
pub mod delayed;
pub mod drain;
pub mod error;
pub mod tick;
pub mod timer;

pub use animate::{AnimateConfig, Frame, ValueAnimator, interpolate};
pub use config::{Config, DelayConfig};
pub use delayed::{
    AddOutcome, DEFAULT_TASK_DELAY, DelayedTask, DelayedTaskRegistry, StartOptions, StopOptions, TaskState, delay_task,
};
pub use drain::{BatchConfig, BatchSlicer, DrainSummary, SliceConfig, TimeSlicer};
pub use error::SchedError;
pub use tick::TickHandle;
pub use timer::{LocalScheduler, Scheduler, SharedScheduler, TimerCallback, TimerHandle, VirtualScheduler};
