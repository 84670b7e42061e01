//! Dotted firmware version parsing and ordering.
//!
//! Firmware versions on the device are dot-separated non-negative integers
//! such as `"1.2.0"`. Ordering is component-wise and numeric, so `"1.10.0"`
//! sorts after `"1.2.0"` (a lexical comparison would get this wrong).
//!
//! When one version is a strict prefix of the other the shorter one is
//! lower: `"1.2" < "1.2.0"`. Missing trailing components are *absent*, not
//! zero.
//!
//! ```rust
//! use lora_ota_versioning::compare;
//! use std::cmp::Ordering;
//!
//! # fn main() -> Result<(), lora_ota_versioning::VersionError> {
//! assert_eq!(compare("1.10.0", "1.2.0")?, Ordering::Greater);
//! assert_eq!(compare("1.2", "1.2.0")?, Ordering::Less);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod version;

pub use version::{FirmwareVersion, VersionError, VersionResult, compare, is_newer};
