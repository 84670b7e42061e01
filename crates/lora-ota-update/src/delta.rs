//! Patch compression and digests.
//!
//! Patches travel zlib-compressed and are verified against a hex digest of
//! the decompressed text. The digest algorithm is implied by the digest
//! length: 40 hex characters for SHA-1, 64 for SHA-256.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{OtaError, OtaResult};

/// Digest algorithm of a CHECKSUM message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-1, 40 hex characters
    Sha1,
    /// SHA-256, 64 hex characters
    Sha256,
}

impl DigestAlgorithm {
    /// Pick the algorithm matching a hex digest's length.
    #[must_use]
    pub fn for_hex_digest(digest: &str) -> Option<Self> {
        match digest.len() {
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Lowercase hex digest of `data`.
    #[must_use]
    pub fn hex_digest(self, data: &[u8]) -> String {
        match self {
            Self::Sha1 => {
                use sha1::{Digest, Sha1};
                hex::encode(Sha1::digest(data))
            }
            Self::Sha256 => {
                use sha2::{Digest, Sha256};
                hex::encode(Sha256::digest(data))
            }
        }
    }
}

/// Compress patch text the way the update server does.
///
/// # Errors
///
/// Returns an error if the encoder fails.
pub fn compress_patch(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a reassembled patch buffer into patch text.
///
/// # Errors
///
/// Returns [`OtaError::Decompression`] if the buffer is not a complete zlib
/// stream or the result is not UTF-8.
pub fn decompress_patch(file: &str, compressed: &[u8]) -> OtaResult<String> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| OtaError::Decompression {
            file: file.to_string(),
            reason: e.to_string(),
        })?;
    Ok(text)
}

/// Check that `text` hashes to `expected`.
///
/// Comparison is on lowercase hex. A digest of unsupported length can never
/// match and is reported as a mismatch against the SHA-1 of the text.
///
/// # Errors
///
/// Returns [`OtaError::ChecksumMismatch`] on any difference.
pub fn verify_checksum(file: &str, text: &[u8], expected: &str) -> OtaResult<()> {
    let expected = expected.trim().to_ascii_lowercase();
    let algorithm = DigestAlgorithm::for_hex_digest(&expected).unwrap_or(DigestAlgorithm::Sha1);
    let actual = algorithm.hex_digest(text);

    if actual == expected {
        Ok(())
    } else {
        Err(OtaError::ChecksumMismatch {
            file: file.to_string(),
            expected,
            actual,
        })
    }
}
