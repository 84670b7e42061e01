//! Shared test utilities for the LoRa OTA workspace.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`mock`] - Mock transport, reboot and clock collaborators
//! - [`fixtures`] - Server-side frame builders and temporary device roots
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! lora-ota-test-helpers = { workspace = true }
//! ```
//!
//! ```rust,ignore
//! use lora_ota_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]

pub mod must;
pub mod prelude;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "fixtures")]
pub mod fixtures;

pub use must::*;
