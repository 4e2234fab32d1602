//! Time-sliced draining of large workloads
//!
//! Both slicers take an owned copy of the caller's items and process them
//! front to back, exactly once each, across as many ticks as needed. They
//! differ only in how much work a tick does.

mod batch_slicer;
mod config;
mod queue;
mod time_slicer;

pub use batch_slicer::BatchSlicer;
pub use config::{BatchConfig, SliceConfig};
pub use queue::DrainSummary;
pub use time_slicer::TimeSlicer;
