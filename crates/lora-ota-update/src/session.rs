//! Per-device update session state.

use std::collections::BTreeMap;
use std::fmt;

use lora_ota_protocol::MulticastCredentials;
use lora_ota_versioning::FirmwareVersion;

use crate::assembler::PatchAssembler;
use crate::manifest::ManifestReconciler;

/// Where a session is in the update protocol.
///
/// Committed and reverted outcomes are not states: both reboot the device
/// and the session is back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No update in progress
    #[default]
    Idle,
    /// Newer version offered, waiting for multicast credentials
    Negotiating,
    /// Listening on the multicast group for file operations
    Receiving,
    /// Checking the manifest and applying patches
    Reconciling,
}

impl SessionState {
    /// Get the state as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Negotiating => "Negotiating",
            Self::Receiving => "Receiving",
            Self::Reconciling => "Reconciling",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single update session of a device.
///
/// Created once per boot and reused across attempts; [`reset`](Self::reset)
/// returns it to its zero value on every terminal outcome.
#[derive(Debug, Default)]
pub struct UpdateSession {
    pub(crate) state: SessionState,
    pub(crate) target_version: Option<FirmwareVersion>,
    pub(crate) assembler: PatchAssembler,
    pub(crate) verified_patches: BTreeMap<String, String>,
    pub(crate) checksum_failed: bool,
    pub(crate) multicast: Option<MulticastCredentials>,
    pub(crate) manifest: ManifestReconciler,
}

impl UpdateSession {
    /// Create an idle session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether an update is in progress.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Version being installed, once negotiated.
    #[must_use]
    pub fn target_version(&self) -> Option<&FirmwareVersion> {
        self.target_version.as_ref()
    }

    /// File currently receiving PATCH fragments.
    #[must_use]
    pub fn file_to_patch(&self) -> Option<&str> {
        self.assembler.pending_file()
    }

    /// Patches that passed their checksum, by file.
    #[must_use]
    pub fn verified_patches(&self) -> &BTreeMap<String, String> {
        &self.verified_patches
    }

    /// Whether any checksum failed this session.
    #[must_use]
    pub fn checksum_failed(&self) -> bool {
        self.checksum_failed
    }

    /// Multicast credentials in use.
    #[must_use]
    pub fn multicast(&self) -> Option<&MulticastCredentials> {
        self.multicast.as_ref()
    }

    /// Device-side manifest bookkeeping.
    #[must_use]
    pub fn manifest(&self) -> &ManifestReconciler {
        &self.manifest
    }

    /// Return to the zero value.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
