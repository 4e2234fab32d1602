//! Animator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Value animator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimateConfig {
    /// Tick cadence in milliseconds (one 60 Hz frame by default)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000 / 60
}

impl Default for AnimateConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl AnimateConfig {
    /// Get the tick cadence as a Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
