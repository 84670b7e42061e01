//! Watchdog monitor and its background poll task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::activity::ActivityClock;
use crate::config::WatchdogConfig;
use crate::error::WatchdogResult;
use crate::state::{WatchdogState, WatchdogStatus};

/// Callback run when an armed watchdog expires. Receives the idle time
/// that was observed.
pub type ExpiryCallback = Box<dyn Fn(Duration) + Send + Sync>;

/// Inactivity watchdog for one update session at a time.
///
/// The owner of the session calls [`arm`](Self::arm) when negotiation
/// starts, [`touch`](Self::touch) for every processed message and
/// [`disarm`](Self::disarm) on every terminal transition. The task started
/// by [`spawn`](Self::spawn) only reads the activity clock.
#[derive(Debug)]
pub struct WatchdogMonitor {
    config: WatchdogConfig,
    activity: ActivityClock,
    state: WatchdogState,
}

impl WatchdogMonitor {
    /// Create a disarmed monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WatchdogConfig) -> WatchdogResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            activity: ActivityClock::new(),
            state: WatchdogState::new(),
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Start (or restart) watching: resets the idle timer and arms.
    pub fn arm(&self) {
        self.activity.touch();
        let previous = self.state.arm();
        if previous != WatchdogStatus::Armed {
            tracing::debug!(
                timeout_ms = self.config.inactivity_timeout.as_millis(),
                %previous,
                "watchdog armed"
            );
        }
    }

    /// Record session progress.
    pub fn touch(&self) {
        self.activity.touch();
    }

    /// Stop watching.
    pub fn disarm(&self) {
        if self.state.disarm() != WatchdogStatus::Disarmed {
            tracing::debug!("watchdog disarmed");
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> WatchdogStatus {
        self.state.status()
    }

    /// Whether a session is being watched.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.status() == WatchdogStatus::Armed
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.activity.idle_for()
    }

    /// Counters for diagnostics.
    #[must_use]
    pub fn state(&self) -> &WatchdogState {
        &self.state
    }

    /// Check for expiry once.
    ///
    /// Returns the observed idle time when this call performed the
    /// `Armed` to `Expired` transition, `None` otherwise.
    pub fn poll(&self) -> Option<Duration> {
        if self.state.status() != WatchdogStatus::Armed {
            return None;
        }
        let idle = self.activity.idle_for();
        if idle < self.config.inactivity_timeout {
            return None;
        }
        self.state.try_expire().then_some(idle)
    }

    /// Spawn the background poll task on the current tokio runtime.
    ///
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn(self: &Arc<Self>, on_expiry: ExpiryCallback) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(idle) = monitor.poll() {
                    tracing::warn!(
                        idle_ms = idle.as_millis(),
                        timeout_ms = monitor.config.inactivity_timeout.as_millis(),
                        "inactivity timeout, session stalled"
                    );
                    on_expiry(idle);
                }
            }
        })
    }
}
