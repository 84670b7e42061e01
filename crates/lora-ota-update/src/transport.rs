//! Collaborators the engine drives but does not implement.
//!
//! The radio layer pushes received frames into
//! [`OtaAgent::handle_frame`](crate::OtaAgent::handle_frame) and carries
//! outbound frames through [`Transport`]. Rebooting and wall-clock access
//! are platform services behind [`Reboot`] and [`DeviceClock`].

use std::fmt;

use lora_ota_protocol::MulticastCredentials;
use thiserror::Error;

use crate::error::OtaResult;

/// Errors surfaced by a [`Transport`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Frame could not be queued or transmitted
    #[error("send failed: {0}")]
    Send(String),

    /// Joining the multicast group failed
    #[error("multicast switch failed: {0}")]
    Multicast(String),

    /// The link is gone
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Create a send error.
    #[must_use]
    pub fn send(reason: impl Into<String>) -> Self {
        Self::Send(reason.into())
    }

    /// Create a multicast error.
    #[must_use]
    pub fn multicast(reason: impl Into<String>) -> Self {
        Self::Multicast(reason.into())
    }
}

/// Outbound half of the radio link.
pub trait Transport: Send {
    /// Transmit one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be sent.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Switch reception to the fleet-wide multicast group.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio could not join the group.
    fn switch_to_multicast(
        &mut self,
        credentials: &MulticastCredentials,
    ) -> Result<(), TransportError>;
}

/// Why the device is rebooting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebootReason {
    /// Update committed; boot into the new firmware
    Committed {
        /// Version that was installed
        version: String,
    },
    /// Update reverted; boot into the previous firmware
    Reverted {
        /// Human readable cause
        cause: String,
    },
}

impl fmt::Display for RebootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { version } => write!(f, "committed {version}"),
            Self::Reverted { cause } => write!(f, "reverted: {cause}"),
        }
    }
}

/// Device reset primitive.
///
/// Committed and reverted updates only take effect through a reboot.
pub trait Reboot: Send {
    /// Request a full device reboot.
    fn reboot(&mut self, reason: RebootReason);
}

/// Wall clock of the device, in Unix seconds.
pub trait DeviceClock: Send {
    /// Current wall-clock time.
    fn now_epoch(&self) -> i64;

    /// Set the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::ClockSync`](crate::OtaError::ClockSync) if the
    /// clock could not be set.
    fn set_epoch(&mut self, epoch: i64) -> OtaResult<()>;
}
