//! Error types for frame decoding.

use thiserror::Error;

use crate::message::MessageType;

/// Errors produced while decoding a frame or one of its payloads.
///
/// Every variant is recoverable: the frame is dropped and the session is
/// left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is shorter than the smallest valid frame
    #[error("frame truncated ({len} bytes)")]
    Truncated {
        /// Length of the received frame
        len: usize,
    },

    /// Frame does not start with `$OTA,`
    #[error("frame does not start with the OTA header")]
    MissingHeader,

    /// Frame does not end with `,*`
    #[error("frame does not end with the OTA tail")]
    MissingTail,

    /// Type discriminator is not an integer
    #[error("invalid message type field: {0:?}")]
    InvalidType(String),

    /// Type discriminator is an integer outside the protocol
    #[error("unknown message type: {0}")]
    UnknownType(u32),

    /// A text frame contained bytes that are not UTF-8
    #[error("{kind} frame is not valid UTF-8")]
    NotUtf8 {
        /// Message type of the frame
        kind: MessageType,
    },

    /// A required field is absent or empty
    #[error("{kind} frame is missing field '{field}'")]
    MissingField {
        /// Message type of the frame
        kind: MessageType,
        /// Name of the missing field
        field: &'static str,
    },

    /// Multicast credentials are not well-formed hex of the right size
    #[error("invalid multicast credentials: {0}")]
    InvalidCredentials(String),

    /// Manifest payload could not be parsed
    #[error("invalid manifest payload: {0}")]
    InvalidManifest(String),
}

impl ProtocolError {
    /// Create a missing field error.
    #[must_use]
    pub fn missing_field(kind: MessageType, field: &'static str) -> Self {
        Self::MissingField { kind, field }
    }

    /// Create an invalid credentials error.
    #[must_use]
    pub fn invalid_credentials(reason: impl Into<String>) -> Self {
        Self::InvalidCredentials(reason.into())
    }

    /// Create an invalid manifest error.
    #[must_use]
    pub fn invalid_manifest(reason: impl Into<String>) -> Self {
        Self::InvalidManifest(reason.into())
    }
}

/// A specialized `Result` type for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
