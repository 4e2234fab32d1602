//! Scalar animation over a fixed duration
//!
//! Each tick recomputes progress from the time elapsed since the animation
//! started, not from the number of ticks, so timer jitter never accumulates.

mod config;
mod core;

pub use config::AnimateConfig;
pub use core::{Frame, ValueAnimator, interpolate};
