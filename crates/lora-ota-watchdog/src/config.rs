//! Watchdog configuration.

use std::time::Duration;

use crate::error::{WatchdogError, WatchdogResult};

/// Default inactivity timeout before a stalled session is reverted.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default poll interval of the background task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Inactivity watchdog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Idle time after which an armed watchdog expires.
    pub inactivity_timeout: Duration,
    /// How often the background task checks for expiry.
    pub poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WatchdogConfig {
    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either duration is zero or the poll interval is
    /// longer than the inactivity timeout.
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.inactivity_timeout.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "inactivity_timeout must be greater than zero",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "poll_interval must be greater than zero",
            ));
        }
        if self.poll_interval > self.inactivity_timeout {
            return Err(WatchdogError::PollSlowerThanTimeout {
                poll: self.poll_interval,
                timeout: self.inactivity_timeout,
            });
        }
        Ok(())
    }
}

/// Builder for [`WatchdogConfig`].
#[derive(Debug, Clone, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// Set the inactivity timeout.
    #[must_use]
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.config.inactivity_timeout = timeout;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> WatchdogResult<WatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
