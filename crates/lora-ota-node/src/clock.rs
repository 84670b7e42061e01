//! Wall clock with a settable offset, standing in for the device RTC.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use lora_ota_update::{DeviceClock, OtaError, OtaResult};
use parking_lot::Mutex;

/// Host clock plus an offset. Clones share the offset, so a value set
/// during one boot survives the in-process reboot.
#[derive(Debug, Clone, Default)]
pub struct OffsetClock {
    offset: Arc<Mutex<i64>>,
}

impl OffsetClock {
    /// Clock reading host time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock reading close to the epoch, like a device without RTC backup.
    #[must_use]
    pub fn unset() -> Self {
        let clock = Self::default();
        *clock.offset.lock() = host_epoch().saturating_neg();
        clock
    }
}

impl DeviceClock for OffsetClock {
    fn now_epoch(&self) -> i64 {
        host_epoch().saturating_add(*self.offset.lock())
    }

    fn set_epoch(&mut self, epoch: i64) -> OtaResult<()> {
        if epoch < 0 {
            return Err(OtaError::clock_sync(format!("negative epoch {epoch}")));
        }
        *self.offset.lock() = epoch.saturating_sub(host_epoch());
        Ok(())
    }
}

fn host_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
