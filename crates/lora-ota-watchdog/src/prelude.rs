//! Prelude module for convenient imports.
//!
//! ```
//! use lora_ota_watchdog::prelude::*;
//! ```

pub use crate::activity::ActivityClock;
pub use crate::config::{WatchdogConfig, WatchdogConfigBuilder};
pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::monitor::{ExpiryCallback, WatchdogMonitor};
pub use crate::state::{WatchdogState, WatchdogStatus};
