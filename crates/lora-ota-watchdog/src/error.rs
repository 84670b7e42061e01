//! Error types for the inactivity watchdog.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while configuring or driving the watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchdogError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Poll interval longer than the timeout it is meant to detect.
    #[error("Poll interval {poll:?} exceeds inactivity timeout {timeout:?}")]
    PollSlowerThanTimeout {
        /// Configured poll interval.
        poll: Duration,
        /// Configured inactivity timeout.
        timeout: Duration,
    },
}

impl WatchdogError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

/// Result type for watchdog operations.
pub type WatchdogResult<T> = Result<T, WatchdogError>;
