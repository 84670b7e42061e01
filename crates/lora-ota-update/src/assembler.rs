//! Reassembly and verification of fragmented patches.

use crate::delta::{decompress_patch, verify_checksum};
use crate::error::OtaResult;

/// Patch text that passed its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPatch {
    /// File the patch applies to
    pub file: String,
    /// Decompressed patch text
    pub text: String,
}

/// Collects PATCH fragments for the file named by the last FILENAME.
#[derive(Debug, Default)]
pub struct PatchAssembler {
    file: Option<String>,
    buffer: Vec<u8>,
    fragments: usize,
}

impl PatchAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting for `file`.
    ///
    /// Returns the previous file if it never received its CHECKSUM; its
    /// fragments are discarded.
    pub fn begin(&mut self, file: impl Into<String>) -> Option<String> {
        let abandoned = self.file.replace(file.into());
        self.buffer.clear();
        self.fragments = 0;
        abandoned
    }

    /// File currently being collected.
    #[must_use]
    pub fn pending_file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Append a fragment. Returns `false`, and stores nothing, when no
    /// file has been declared.
    pub fn append(&mut self, fragment: &[u8]) -> bool {
        if self.file.is_none() {
            return false;
        }
        self.buffer.extend_from_slice(fragment);
        self.fragments = self.fragments.saturating_add(1);
        true
    }

    /// Bytes collected for the pending file.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Fragments collected for the pending file.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Close the pending file: decompress, hash and compare with `digest`.
    ///
    /// The assembler is empty afterwards whatever the outcome. Returns
    /// `None` when no file was pending.
    pub fn finish(&mut self, digest: &str) -> Option<OtaResult<VerifiedPatch>> {
        let file = self.file.take()?;
        let buffer = std::mem::take(&mut self.buffer);
        self.fragments = 0;

        Some(decompress_patch(&file, &buffer).and_then(|text| {
            verify_checksum(&file, text.as_bytes(), digest)?;
            Ok(VerifiedPatch { file, text })
        }))
    }
}
