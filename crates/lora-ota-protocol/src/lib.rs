//! LoRa OTA wire protocol: frame layout, message model and codec.
//!
//! This crate is I/O-free. It turns raw radio frames into a closed
//! [`Message`] enum exactly once at the boundary and renders outbound
//! messages back into frames, so the update engine never inspects raw bytes.
//!
//! Frames look like `$OTA,<type>,<field>,...,*`. Text frames are ASCII/UTF-8;
//! PATCH frames carry arbitrary compressed bytes between `$OTA,6,` and `,*`
//! and are never text-decoded or comma-split.

#![deny(static_mut_refs)]
#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod frame;
pub mod manifest;
pub mod message;
pub mod multicast;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{FRAME_HEADER, FRAME_TAIL, is_ota_frame, message_type};
pub use manifest::ManifestCounters;
pub use message::{Direction, Message, MessageType};
pub use multicast::{MulticastCredentials, MulticastKeyFields};
