//! Slicer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time slicer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Delay before each tick in milliseconds
    #[serde(default = "default_slice_tick_delay_ms")]
    pub tick_delay_ms: u64,
}

fn default_slice_tick_delay_ms() -> u64 {
    100
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            tick_delay_ms: default_slice_tick_delay_ms(),
        }
    }
}

/// Config stores whole milliseconds; sub-millisecond parts are truncated
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl SliceConfig {
    /// Build from a `Duration`, truncated to whole milliseconds
    pub fn with_tick_delay(tick_delay: Duration) -> Self {
        Self {
            tick_delay_ms: whole_millis(tick_delay),
        }
    }

    /// Get the tick delay as a Duration
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }
}

/// Batch slicer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Delay before each tick in milliseconds
    #[serde(default = "default_batch_tick_delay_ms")]
    pub tick_delay_ms: u64,

    /// Time a tick may keep processing items, checked after each item
    #[serde(default = "default_per_tick_budget_ms")]
    pub per_tick_budget_ms: u64,
}

fn default_batch_tick_delay_ms() -> u64 {
    25
}

fn default_per_tick_budget_ms() -> u64 {
    50
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            tick_delay_ms: default_batch_tick_delay_ms(),
            per_tick_budget_ms: default_per_tick_budget_ms(),
        }
    }
}

impl BatchConfig {
    /// Build from `Duration`s, truncated to whole milliseconds
    pub fn new(tick_delay: Duration, per_tick_budget: Duration) -> Self {
        Self {
            tick_delay_ms: whole_millis(tick_delay),
            per_tick_budget_ms: whole_millis(per_tick_budget),
        }
    }

    /// Get the tick delay as a Duration
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }

    /// Get the per-tick budget as a Duration
    pub fn per_tick_budget(&self) -> Duration {
        Duration::from_millis(self.per_tick_budget_ms)
    }
}
