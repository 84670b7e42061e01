//! Frame layout helpers.
//!
//! A frame is `$OTA` `,` `<type>` (`,` `<field>`)* `,` `*`. Splitting stops
//! after the type field; the rest of the frame is handed to the message
//! decoder as an opaque body so binary PATCH payloads survive intact.

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::MessageType;

/// Frame header bytes.
pub const FRAME_HEADER: &[u8] = b"$OTA";

/// Frame tail bytes.
pub const FRAME_TAIL: &[u8] = b"*";

const FIELD_DELIMITER: u8 = b',';
const HEADER_WITH_DELIMITER: &[u8] = b"$OTA,";
const TAIL_WITH_DELIMITER: &[u8] = b",*";

/// `$OTA,4,*`
const MIN_FRAME_LEN: usize = 8;

/// The two pieces of a frame the decoder cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameParts<'a> {
    pub type_field: &'a [u8],
    pub body: &'a [u8],
}

/// Check whether a frame carries the OTA header.
///
/// The transport uses this to route OTA traffic to the update engine and
/// everything else to the application.
#[must_use]
pub fn is_ota_frame(raw: &[u8]) -> bool {
    raw.starts_with(FRAME_HEADER)
}

/// Read only the type discriminator of a frame.
///
/// # Errors
///
/// Returns a [`ProtocolError`] when the framing is broken or the
/// discriminator is not a known message type.
pub fn message_type(raw: &[u8]) -> ProtocolResult<MessageType> {
    parse_type(split(raw)?.type_field)
}

pub(crate) fn split(raw: &[u8]) -> ProtocolResult<FrameParts<'_>> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::Truncated { len: raw.len() });
    }

    let inner = raw
        .strip_prefix(HEADER_WITH_DELIMITER)
        .ok_or(ProtocolError::MissingHeader)?;
    let inner = inner
        .strip_suffix(TAIL_WITH_DELIMITER)
        .ok_or(ProtocolError::MissingTail)?;

    match inner.iter().position(|&b| b == FIELD_DELIMITER) {
        Some(idx) => {
            let (type_field, rest) = inner.split_at(idx);
            Ok(FrameParts {
                type_field,
                body: rest.get(1..).unwrap_or_default(),
            })
        }
        None => Ok(FrameParts {
            type_field: inner,
            body: &[],
        }),
    }
}

pub(crate) fn parse_type(type_field: &[u8]) -> ProtocolResult<MessageType> {
    let text = std::str::from_utf8(type_field)
        .map_err(|_| ProtocolError::InvalidType(String::from_utf8_lossy(type_field).into_owned()))?;

    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidType(text.to_string()));
    }

    let code = text
        .parse::<u32>()
        .map_err(|_| ProtocolError::InvalidType(text.to_string()))?;

    MessageType::try_from(code)
}

pub(crate) fn assemble(kind: MessageType, fields: &[&[u8]]) -> Vec<u8> {
    let payload_len: usize = fields.iter().map(|f| f.len().saturating_add(1)).sum();
    let mut out = Vec::with_capacity(payload_len.saturating_add(MIN_FRAME_LEN));

    out.extend_from_slice(FRAME_HEADER);
    out.push(FIELD_DELIMITER);
    out.extend_from_slice(kind.code().to_string().as_bytes());
    for field in fields {
        out.push(FIELD_DELIMITER);
        out.extend_from_slice(field);
    }
    out.push(FIELD_DELIMITER);
    out.extend_from_slice(FRAME_TAIL);
    out
}
