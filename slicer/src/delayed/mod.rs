//! Deferred actions
//!
//! - [`DelayedTaskRegistry`] - keyed, each id runs at most once ever
//! - [`delay_task`] - one unkeyed action with a cancel handle

mod registry;
mod task;

pub use registry::{AddOutcome, DelayedTaskRegistry, StartOptions, StopOptions, TaskState};
pub use task::{DEFAULT_TASK_DELAY, DelayedTask, delay_task};
