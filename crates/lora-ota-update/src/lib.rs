//! OTA update engine for radio-connected devices.
//!
//! The engine negotiates an update over a lossy half-duplex link,
//! reassembles compressed text patches delivered in fragments, verifies
//! them, reconciles the server's manifest with what the device actually
//! queued, and replaces files transactionally so that the device always
//! boots either the old firmware or the new one.
//!
//! # Architecture
//!
//! - [`engine`]: [`OtaAgent`], the message router driving the session
//! - [`session`]: [`UpdateSession`] and its states
//! - [`assembler`]: fragment reassembly and checksum verification
//! - [`delta`]: zlib decompression and digests
//! - [`text_patch`]: character-based text patch parsing and application
//! - [`manifest`]: device-side manifest counters and reconciliation
//! - [`transaction`]: `.bak`/`.del` based commit and revert
//! - [`transport`]: collaborator traits for the radio, reboot and clock
//! - [`config`]: engine configuration
//! - [`error`]: error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use lora_ota_update::prelude::*;
//!
//! let mut agent = OtaAgent::new(config, version, radio, reboot, clock)?;
//! agent.recover()?;
//! agent.announce()?;
//! while let Some(frame) = radio_rx.recv().await {
//!     agent.handle_frame(&frame);
//! }
//! ```

#![deny(static_mut_refs)]
#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod assembler;
pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod session;
pub mod text_patch;
pub mod transaction;
pub mod transport;

pub mod prelude;

pub use assembler::{PatchAssembler, VerifiedPatch};
pub use config::AgentConfig;
pub use engine::{HandleOutcome, OtaAgent};
pub use error::{OtaError, OtaResult};
pub use manifest::ManifestReconciler;
pub use session::{SessionState, UpdateSession};
pub use transaction::{Artifact, ArtifactKind, FileTransactionManager, RevertReport};
pub use transport::{DeviceClock, Reboot, RebootReason, Transport, TransportError};
