//! Prelude module for convenient imports.
//!
//! ```
//! use lora_ota_update::prelude::*;
//! ```

pub use crate::assembler::{PatchAssembler, VerifiedPatch};
pub use crate::config::AgentConfig;
pub use crate::delta::{DigestAlgorithm, compress_patch, decompress_patch, verify_checksum};
pub use crate::engine::{HandleOutcome, OtaAgent};
pub use crate::error::{OtaError, OtaResult};
pub use crate::manifest::ManifestReconciler;
pub use crate::session::{SessionState, UpdateSession};
pub use crate::transaction::{Artifact, ArtifactKind, FileTransactionManager, RevertReport};
pub use crate::transport::{DeviceClock, Reboot, RebootReason, Transport, TransportError};

pub use lora_ota_protocol::{ManifestCounters, Message, MessageType, MulticastCredentials};
pub use lora_ota_versioning::FirmwareVersion;
