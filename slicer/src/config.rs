//! Configuration for slicer

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::animate::AnimateConfig;
use crate::drain::{BatchConfig, SliceConfig};

/// Delayed task configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Delay before a task runs in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    crate::DEFAULT_TASK_DELAY.as_millis() as u64
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

impl DelayConfig {
    /// Get the delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Time slicer defaults
    #[serde(default)]
    pub chunk: SliceConfig,

    /// Batch slicer defaults
    #[serde(default)]
    pub batch: BatchConfig,

    /// Value animator defaults
    #[serde(default)]
    pub animate: AnimateConfig,

    /// Delayed task defaults
    #[serde(default)]
    pub delay: DelayConfig,
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        debug!(?path, "Config::load: called");
        if let Some(config_path) = path {
            debug!(?config_path, "Config::load: explicit path");
            return Self::load_from(config_path);
        }

        for path in Self::default_paths().iter().flatten() {
            if path.exists() {
                debug!(?path, "Config::load: found default config");
                return Self::load_from(path);
            }
        }

        debug!("Config::load: no config file, using defaults");
        Ok(Config::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are ignored here; the full load reports them later.
    pub fn load_log_level(path: Option<&PathBuf>) -> Option<String> {
        Self::load(path).ok().and_then(|config| config.log_level)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config from {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).context(format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    fn default_paths() -> [Option<PathBuf>; 2] {
        [
            dirs::config_dir().map(|p| p.join("slicer").join("slicer.yml")),
            Some(PathBuf::from("slicer.yml")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_toolkit_timings() {
        let config = Config::default();
        assert_eq!(config.chunk.tick_delay(), Duration::from_millis(100));
        assert_eq!(config.batch.tick_delay(), Duration::from_millis(25));
        assert_eq!(config.batch.per_tick_budget(), Duration::from_millis(50));
        assert_eq!(config.animate.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.delay.delay(), Duration::from_millis(600));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slicer.yml");
        std::fs::write(&path, "log_level: DEBUG\nbatch:\n  per_tick_budget_ms: 8\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.batch.per_tick_budget_ms, 8);
        assert_eq!(config.batch.tick_delay_ms, 25);
        assert_eq!(config.chunk, SliceConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.yml");
        let mut config = Config::default();
        config.delay.delay_ms = 42;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.delay.delay_ms, 42);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "chunk: [not, a, map]").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.yml"));
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
