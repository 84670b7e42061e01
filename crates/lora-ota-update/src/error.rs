//! Error taxonomy for the update engine.

use std::io;
use std::path::PathBuf;

use lora_ota_protocol::{ManifestCounters, MessageType, ProtocolError};
use lora_ota_versioning::VersionError;
use lora_ota_watchdog::WatchdogError;
use thiserror::Error;

use crate::session::SessionState;
use crate::transaction::RevertReport;
use crate::transport::TransportError;

/// Errors that can occur while running an update session.
///
/// Use [`OtaError::is_session_fatal`] to decide between dropping the
/// offending message and reverting the whole session.
#[derive(Error, Debug)]
pub enum OtaError {
    /// Malformed frame or payload
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Decompressed patch does not hash to the announced digest
    #[error("Checksum mismatch for {file}: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        /// File the patch belongs to
        file: String,
        /// Digest announced by the server
        expected: String,
        /// Digest computed on the device
        actual: String,
    },

    /// Patch buffer is not a valid compressed stream
    #[error("Decompression failed for {file}: {reason}")]
    Decompression {
        /// File the patch belongs to
        file: String,
        /// Decoder error
        reason: String,
    },

    /// Device counters disagree with the server manifest
    #[error("Manifest mismatch: server declared {expected}, device counted {actual}")]
    ManifestMismatch {
        /// Server-declared counters
        expected: ManifestCounters,
        /// Device-local counters
        actual: ManifestCounters,
    },

    /// Manifest payload could not be parsed
    #[error("Manifest could not be parsed: {0}")]
    ManifestParse(String),

    /// One or more hunks could not be located in the current file
    #[error("Patch for {file} failed to apply ({failed_hunks} of {total_hunks} hunks rejected)")]
    PatchApplyFailed {
        /// File being patched
        file: String,
        /// Number of rejected hunks
        failed_hunks: usize,
        /// Number of hunks in the patch
        total_hunks: usize,
    },

    /// A patch failed its checksum earlier in the session
    #[error("A patch failed its checksum earlier in the session")]
    EarlierChecksumFailure,

    /// No message was processed for longer than the inactivity timeout
    #[error("No progress for {idle:?}")]
    InactivityTimeout {
        /// Observed idle time
        idle: std::time::Duration,
    },

    /// Patch text is not in the expected format
    #[error("Patch text for {file} is malformed: {reason}")]
    PatchParse {
        /// File the patch belongs to
        file: String,
        /// Parser error
        reason: String,
    },

    /// Filesystem operation failed
    #[error("File {op} failed for {}: {source}", .path.display())]
    FileIo {
        /// Operation that failed
        op: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Device clock could not be set
    #[error("Clock sync failed: {0}")]
    ClockSync(String),

    /// Version string is not a dot-separated list of integers
    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    /// Radio transport reported a failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Filename escapes the device root or collides with an artifact name
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    /// Message is not accepted in the current session state
    #[error("Unexpected {message} in state {state}")]
    UnexpectedMessage {
        /// Kind of the message
        message: MessageType,
        /// Session state at arrival
        state: SessionState,
    },

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Some artifacts could not be reverted; the rest were
    #[error("Revert left {} artifact(s) pending: {source}", .report.failed.len())]
    RevertIncomplete {
        /// What the revert did, including the artifacts left in place
        report: RevertReport,
        /// First failure encountered
        #[source]
        source: Box<OtaError>,
    },
}

impl OtaError {
    /// Create a file I/O error.
    #[must_use]
    pub fn file_io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileIo {
            op,
            path: path.into(),
            source,
        }
    }

    /// Create a clock sync error.
    #[must_use]
    pub fn clock_sync(reason: impl Into<String>) -> Self {
        Self::ClockSync(reason.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Whether this error leaves the session inconsistent with the
    /// server's intent, so the only safe response is revert and reboot.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::Decompression { .. }
                | Self::ManifestMismatch { .. }
                | Self::ManifestParse(_)
                | Self::PatchApplyFailed { .. }
                | Self::PatchParse { .. }
                | Self::EarlierChecksumFailure
                | Self::InactivityTimeout { .. }
                | Self::FileIo { .. }
                | Self::RevertIncomplete { .. }
        )
    }
}

impl From<WatchdogError> for OtaError {
    fn from(e: WatchdogError) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

/// Result type for update engine operations.
pub type OtaResult<T> = Result<T, OtaError>;
