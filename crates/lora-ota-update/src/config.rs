//! Update engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use lora_ota_watchdog::WatchdogConfig;
use serde::{Deserialize, Serialize};

use crate::error::{OtaError, OtaResult};

/// Device clocks reading earlier than this are considered unset.
pub const DEFAULT_CLOCK_SYNC_THRESHOLD: i64 = 1_550_000_000;

/// Update engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory holding the live firmware files.
    pub device_root: PathBuf,
    /// Idle seconds before a stalled session is reverted.
    pub inactivity_timeout_secs: u64,
    /// Watchdog poll interval in milliseconds.
    pub watchdog_poll_ms: u64,
    /// The clock is synced from UPDATE_INFO only when it reads below this.
    pub clock_sync_threshold: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_root: PathBuf::from("flash"),
            inactivity_timeout_secs: 60,
            watchdog_poll_ms: 1000,
            clock_sync_threshold: DEFAULT_CLOCK_SYNC_THRESHOLD,
        }
    }
}

impl AgentConfig {
    /// Configuration rooted at `device_root` with default timings.
    pub fn with_root(device_root: impl Into<PathBuf>) -> Self {
        Self {
            device_root: device_root.into(),
            ..Self::default()
        }
    }

    /// Watchdog configuration derived from the timing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the timings do not form a valid watchdog
    /// configuration.
    pub fn watchdog_config(&self) -> OtaResult<WatchdogConfig> {
        Ok(WatchdogConfig::builder()
            .inactivity_timeout(Duration::from_secs(self.inactivity_timeout_secs))
            .poll_interval(Duration::from_millis(self.watchdog_poll_ms))
            .build()?)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the device root is empty or the timings are
    /// invalid.
    pub fn validate(&self) -> OtaResult<()> {
        if self.device_root.as_os_str().is_empty() {
            return Err(OtaError::invalid_config("device_root must not be empty"));
        }
        self.watchdog_config()?;
        Ok(())
    }
}
