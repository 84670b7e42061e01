//! Watchdog status word and counters.

use core::fmt;

use portable_atomic::{AtomicU32, Ordering};

/// Watchdog operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum WatchdogStatus {
    /// No session is being watched.
    #[default]
    Disarmed = 0,
    /// A session is being watched.
    Armed = 1,
    /// The session went idle and the expiry callback has run.
    Expired = 2,
}

impl WatchdogStatus {
    /// Convert from raw u32 value.
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Disarmed),
            1 => Some(Self::Armed),
            2 => Some(Self::Expired),
            _ => None,
        }
    }

    /// Convert to raw u32 value.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Get the status as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disarmed => "Disarmed",
            Self::Armed => "Armed",
            Self::Expired => "Expired",
        }
    }
}

impl fmt::Display for WatchdogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic watchdog state.
///
/// Expiry is a `compare_exchange` from `Armed` to `Expired`, so for any
/// single arming at most one caller observes the transition.
#[derive(Debug, Default)]
pub struct WatchdogState {
    status: AtomicU32,
    arm_count: AtomicU32,
    expiry_count: AtomicU32,
}

impl WatchdogState {
    /// Create a new state in the `Disarmed` status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> WatchdogStatus {
        WatchdogStatus::from_raw(self.status.load(Ordering::Acquire))
            .unwrap_or(WatchdogStatus::Disarmed)
    }

    /// Move to `Armed` from any status and return the previous one.
    pub fn arm(&self) -> WatchdogStatus {
        let previous = self
            .status
            .swap(WatchdogStatus::Armed.to_raw(), Ordering::AcqRel);
        let previous = WatchdogStatus::from_raw(previous).unwrap_or(WatchdogStatus::Disarmed);
        if previous != WatchdogStatus::Armed {
            self.arm_count.fetch_add(1, Ordering::Relaxed);
        }
        previous
    }

    /// Move to `Disarmed` from any status and return the previous one.
    pub fn disarm(&self) -> WatchdogStatus {
        let previous = self
            .status
            .swap(WatchdogStatus::Disarmed.to_raw(), Ordering::AcqRel);
        WatchdogStatus::from_raw(previous).unwrap_or(WatchdogStatus::Disarmed)
    }

    /// Attempt the `Armed` to `Expired` transition.
    ///
    /// Returns `true` only for the caller that performed the transition.
    pub fn try_expire(&self) -> bool {
        let won = self
            .status
            .compare_exchange(
                WatchdogStatus::Armed.to_raw(),
                WatchdogStatus::Expired.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            self.expiry_count.fetch_add(1, Ordering::Relaxed);
        }
        won
    }

    /// Number of times the watchdog went from not armed to armed.
    #[must_use]
    pub fn arm_count(&self) -> u32 {
        self.arm_count.load(Ordering::Relaxed)
    }

    /// Number of expiries.
    #[must_use]
    pub fn expiry_count(&self) -> u32 {
        self.expiry_count.load(Ordering::Relaxed)
    }
}
