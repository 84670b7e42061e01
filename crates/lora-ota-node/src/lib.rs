//! Host node for the LoRa OTA update engine.
//!
//! Boots [`lora_ota_update::OtaAgent`] against a UDP stand-in for the radio,
//! feeds it every `$OTA` frame, routes watchdog expiries back to it and
//! re-boots it in process whenever it asks for a reboot. Frames without the
//! `$OTA` header are application traffic and never reach the engine.

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod node;
pub mod radio;

pub use config::{NodeConfig, Overrides};
pub use error::NodeError;
pub use node::{Node, RebootLatch};
pub use radio::{AppInbox, Radio, RadioLink, UdpRadio};
