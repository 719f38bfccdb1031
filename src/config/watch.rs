use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::Error;
use crate::Result;

/// Watch loop parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Interval between drains when no change trigger fires
    ///
    /// Default: `default_poll_interval_ms()` (1000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether pipeline counters are recorded
    ///
    /// Default: `default_enable_metrics()` (true)
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            enable_metrics: default_enable_metrics(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "poll_interval_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_enable_metrics() -> bool {
    true
}
