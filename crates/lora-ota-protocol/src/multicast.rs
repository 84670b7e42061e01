//! Multicast session credentials carried by MULTICAST_KEY.

use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Length in bytes of each session key.
pub const KEY_LEN: usize = 16;

/// Length in bytes of the multicast device address.
pub const ADDRESS_LEN: usize = 4;

/// The three hex fields of a MULTICAST_KEY frame, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MulticastKeyFields {
    /// Hex device address
    pub address: String,
    /// Hex network session key
    pub network_key: String,
    /// Hex application session key
    pub app_key: String,
}

impl MulticastKeyFields {
    /// Build from already-hex fields.
    pub fn new(
        address: impl Into<String>,
        network_key: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            network_key: network_key.into(),
            app_key: app_key.into(),
        }
    }

    /// Encode binary credentials as hex fields.
    #[must_use]
    pub fn from_credentials(credentials: &MulticastCredentials) -> Self {
        Self {
            address: hex::encode(credentials.address.to_be_bytes()),
            network_key: hex::encode(credentials.network_key),
            app_key: hex::encode(credentials.app_key),
        }
    }

    /// An empty address means the server has no multicast session to offer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    pub(crate) fn from_text(text: &str) -> ProtocolResult<Self> {
        let mut fields = text.split(',');
        let address = fields.next().unwrap_or_default().trim().to_string();
        let network_key = fields.next().unwrap_or_default().trim().to_string();
        let app_key = fields.next().unwrap_or_default().trim().to_string();

        if !address.is_empty() && (network_key.is_empty() || app_key.is_empty()) {
            return Err(ProtocolError::invalid_credentials(
                "address present without both session keys",
            ));
        }

        Ok(Self {
            address,
            network_key,
            app_key,
        })
    }
}

/// Decoded multicast credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct MulticastCredentials {
    /// Device address, big-endian on the wire
    pub address: u32,
    /// Network session key
    pub network_key: [u8; KEY_LEN],
    /// Application session key
    pub app_key: [u8; KEY_LEN],
}

impl MulticastCredentials {
    /// Decode the hex fields of a MULTICAST_KEY frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCredentials`] if the fields are empty,
    /// not hex, or of the wrong length.
    pub fn parse(fields: &MulticastKeyFields) -> ProtocolResult<Self> {
        if fields.is_empty() {
            return Err(ProtocolError::invalid_credentials("no multicast address"));
        }

        let address: [u8; ADDRESS_LEN] = decode_fixed("address", &fields.address)?;
        Ok(Self {
            address: u32::from_be_bytes(address),
            network_key: decode_fixed("network key", &fields.network_key)?,
            app_key: decode_fixed("app key", &fields.app_key)?,
        })
    }
}

impl fmt::Debug for MulticastCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastCredentials")
            .field("address", &format_args!("{:08x}", self.address))
            .field("network_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

fn decode_fixed<const N: usize>(what: &str, text: &str) -> ProtocolResult<[u8; N]> {
    let bytes = hex::decode(text)
        .map_err(|e| ProtocolError::invalid_credentials(format!("{what}: {e}")))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        ProtocolError::invalid_credentials(format!("{what}: expected {N} bytes, got {len}"))
    })
}
