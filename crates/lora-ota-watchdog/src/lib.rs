//! Inactivity watchdog for OTA update sessions.
//!
//! The watchdog is armed when a session starts negotiating. Every processed
//! protocol message touches a shared [`ActivityClock`]; a background task
//! polls it and, once the session has been idle for the configured timeout,
//! runs the expiry callback exactly once for that arming.
//!
//! The only state shared between the message handler and the poll task is
//! the activity timestamp and the status word, both plain atomics.
//!
//! # State Machine
//!
//! ```text
//! Disarmed ──arm()──► Armed ──idle >= timeout──► Expired
//!     ▲                 │ ▲                          │
//!     └───disarm()──────┘ └──────────arm()───────────┘
//! ```

#![deny(static_mut_refs)]
#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod activity;
pub mod config;
pub mod error;
pub mod monitor;
pub mod state;

pub mod prelude;

pub use activity::ActivityClock;
pub use config::{WatchdogConfig, WatchdogConfigBuilder};
pub use error::{WatchdogError, WatchdogResult};
pub use monitor::{ExpiryCallback, WatchdogMonitor};
pub use state::{WatchdogState, WatchdogStatus};
