//! Shared "last activity" timestamp.

use std::time::Duration;

use portable_atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// Monotonic record of the last time the session made progress.
///
/// Stored as milliseconds since the clock was created so it fits a single
/// atomic word. The message handler is the only writer; the poll task only
/// reads.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_activity_ms: AtomicU64,
}

impl ActivityClock {
    /// Create a clock whose last activity is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    /// Record activity at the current instant.
    pub fn touch(&self) {
        self.last_activity_ms
            .store(self.elapsed_ms(), Ordering::Release);
    }

    /// Time elapsed since the last recorded activity.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Acquire);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
