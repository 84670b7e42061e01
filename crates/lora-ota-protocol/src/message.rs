//! Message model: the closed set of OTA message kinds and their payloads.

use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};
use crate::frame;
use crate::multicast::MulticastKeyFields;

/// Which side of the link originates a message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to device
    Inbound,
    /// Device to server
    Outbound,
}

/// Numeric message discriminator carried in the second frame field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Device announces its running version
    DeviceVersion = 0,
    /// Server offers a candidate version and its clock
    UpdateInfo = 1,
    /// Device acknowledges UPDATE_INFO with its running version
    UpdateInfoReply = 2,
    /// Server hands out multicast session credentials
    MulticastKey = 3,
    /// Device reports it joined the multicast group
    Listening = 4,
    /// Server declares the next file to patch
    Filename = 5,
    /// One fragment of a compressed patch
    Patch = 6,
    /// Digest of the decompressed patch for the current file
    Checksum = 7,
    /// Server asks for a file to be removed
    DeleteFile = 8,
    /// Server-declared manifest of file operations
    Manifest = 9,
}

impl MessageType {
    /// All message types in discriminator order.
    pub const ALL: [MessageType; 10] = [
        Self::DeviceVersion,
        Self::UpdateInfo,
        Self::UpdateInfoReply,
        Self::MulticastKey,
        Self::Listening,
        Self::Filename,
        Self::Patch,
        Self::Checksum,
        Self::DeleteFile,
        Self::Manifest,
    ];

    /// Wire discriminator.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Which side sends this message kind.
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            Self::DeviceVersion | Self::UpdateInfoReply | Self::Listening => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }

    /// Protocol name of the message kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeviceVersion => "DEVICE_VERSION",
            Self::UpdateInfo => "UPDATE_INFO",
            Self::UpdateInfoReply => "UPDATE_INFO_REPLY",
            Self::MulticastKey => "MULTICAST_KEY",
            Self::Listening => "LISTENING",
            Self::Filename => "FILENAME",
            Self::Patch => "PATCH",
            Self::Checksum => "CHECKSUM",
            Self::DeleteFile => "DELETE_FILE",
            Self::Manifest => "MANIFEST",
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| u32::from(kind.code()) == value)
            .ok_or(ProtocolError::UnknownType(value))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded OTA message.
///
/// Text payloads are kept as received. Semantic validation (version syntax,
/// credential hex, manifest JSON) belongs to the consumer so that it can
/// decide whether a bad value is a dropped frame or a failed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `$OTA,0,<version>,*`
    DeviceVersion {
        /// Running firmware version
        version: String,
    },
    /// `$OTA,1,<version>,<epoch>,*`
    UpdateInfo {
        /// Candidate firmware version
        version: String,
        /// Server clock in Unix seconds, when present and numeric
        epoch: Option<i64>,
    },
    /// `$OTA,2,<version>,*`
    UpdateInfoReply {
        /// Running firmware version
        version: String,
    },
    /// `$OTA,3,<addr>,<netkey>,<appkey>,*`
    MulticastKey(MulticastKeyFields),
    /// `$OTA,4,*`
    Listening,
    /// `$OTA,5,<name>,*`
    Filename {
        /// Path of the file relative to the device root
        name: String,
    },
    /// `$OTA,6,<raw-bytes>,*`
    Patch {
        /// Compressed fragment, untouched
        payload: Vec<u8>,
    },
    /// `$OTA,7,<hexsha>,*`
    Checksum {
        /// Hex digest of the decompressed patch text
        digest: String,
    },
    /// `$OTA,8,<name>,*`
    DeleteFile {
        /// Path of the file relative to the device root
        name: String,
    },
    /// `$OTA,9,<json-like-counts>,*`
    Manifest {
        /// Raw manifest payload
        body: String,
    },
}

impl Message {
    /// Message kind of this message.
    #[must_use]
    pub fn kind(&self) -> MessageType {
        match self {
            Self::DeviceVersion { .. } => MessageType::DeviceVersion,
            Self::UpdateInfo { .. } => MessageType::UpdateInfo,
            Self::UpdateInfoReply { .. } => MessageType::UpdateInfoReply,
            Self::MulticastKey(_) => MessageType::MulticastKey,
            Self::Listening => MessageType::Listening,
            Self::Filename { .. } => MessageType::Filename,
            Self::Patch { .. } => MessageType::Patch,
            Self::Checksum { .. } => MessageType::Checksum,
            Self::DeleteFile { .. } => MessageType::DeleteFile,
            Self::Manifest { .. } => MessageType::Manifest,
        }
    }

    /// Decode a raw frame.
    ///
    /// Only the type discriminator of a PATCH frame is read as text; its
    /// payload is copied out byte for byte.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for malformed framing, an unknown type,
    /// non-UTF-8 text frames or missing required fields.
    pub fn decode(raw: &[u8]) -> ProtocolResult<Self> {
        let parts = frame::split(raw)?;
        let kind = frame::parse_type(parts.type_field)?;

        if kind == MessageType::Patch {
            return Ok(Self::Patch {
                payload: parts.body.to_vec(),
            });
        }

        let text = std::str::from_utf8(parts.body).map_err(|_| ProtocolError::NotUtf8 { kind })?;

        match kind {
            MessageType::DeviceVersion => Ok(Self::DeviceVersion {
                version: first_field(kind, "version", text)?,
            }),
            MessageType::UpdateInfo => {
                let mut fields = text.split(',');
                let version = fields
                    .next()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| ProtocolError::missing_field(kind, "version"))?
                    .to_string();
                let epoch = fields.next().and_then(|e| e.trim().parse::<i64>().ok());
                Ok(Self::UpdateInfo { version, epoch })
            }
            MessageType::UpdateInfoReply => Ok(Self::UpdateInfoReply {
                version: first_field(kind, "version", text)?,
            }),
            MessageType::MulticastKey => Ok(Self::MulticastKey(MulticastKeyFields::from_text(text)?)),
            MessageType::Listening => Ok(Self::Listening),
            MessageType::Filename => Ok(Self::Filename {
                name: whole_field(kind, "name", text)?,
            }),
            MessageType::Checksum => Ok(Self::Checksum {
                digest: whole_field(kind, "checksum", text)?.trim().to_string(),
            }),
            MessageType::DeleteFile => Ok(Self::DeleteFile {
                name: whole_field(kind, "name", text)?,
            }),
            MessageType::Manifest => Ok(Self::Manifest {
                body: text.to_string(),
            }),
            MessageType::Patch => Ok(Self::Patch {
                payload: parts.body.to_vec(),
            }),
        }
    }

    /// Render this message as a frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let fields: Vec<&[u8]> = match self {
            Self::DeviceVersion { version } | Self::UpdateInfoReply { version } => {
                vec![version.as_bytes()]
            }
            Self::UpdateInfo { version, epoch } => {
                return frame::assemble(
                    self.kind(),
                    &[
                        version.as_bytes(),
                        epoch.map(|e| e.to_string()).unwrap_or_default().as_bytes(),
                    ],
                );
            }
            Self::MulticastKey(fields) => vec![
                fields.address.as_bytes(),
                fields.network_key.as_bytes(),
                fields.app_key.as_bytes(),
            ],
            Self::Listening => Vec::new(),
            Self::Filename { name } | Self::DeleteFile { name } => vec![name.as_bytes()],
            Self::Patch { payload } => vec![payload.as_slice()],
            Self::Checksum { digest } => vec![digest.as_bytes()],
            Self::Manifest { body } => vec![body.as_bytes()],
        };
        frame::assemble(self.kind(), &fields)
    }

    /// Short description for logs; never includes patch bytes or keys.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::DeviceVersion { version }
            | Self::UpdateInfoReply { version }
            | Self::UpdateInfo { version, .. } => format!("{} {version}", self.kind()),
            Self::Filename { name } | Self::DeleteFile { name } => {
                format!("{} {name}", self.kind())
            }
            Self::Patch { payload } => format!("{} {} bytes", self.kind(), payload.len()),
            Self::Checksum { digest } => format!("{} {digest}", self.kind()),
            Self::MulticastKey(_) | Self::Listening | Self::Manifest { .. } => {
                self.kind().to_string()
            }
        }
    }
}

fn first_field(kind: MessageType, field: &'static str, text: &str) -> ProtocolResult<String> {
    text.split(',')
        .next()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::missing_field(kind, field))
}

// Single-field messages keep everything up to the tail, commas included.
fn whole_field(kind: MessageType, field: &'static str, text: &str) -> ProtocolResult<String> {
    if text.is_empty() {
        return Err(ProtocolError::missing_field(kind, field));
    }
    Ok(text.to_string())
}
