//! Device-side manifest bookkeeping.

use lora_ota_protocol::ManifestCounters;

use crate::error::{OtaError, OtaResult};

/// Counts file operations during a session and checks them against the
/// server's MANIFEST.
#[derive(Debug, Default, Clone)]
pub struct ManifestReconciler {
    counters: ManifestCounters,
}

impl ManifestReconciler {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current device-side counters.
    #[must_use]
    pub fn counters(&self) -> ManifestCounters {
        self.counters
    }

    /// Count a FILENAME for a file that does not exist yet.
    pub fn record_new(&mut self) {
        self.counters.record_new();
    }

    /// Count a FILENAME for an existing file.
    pub fn record_updated(&mut self) {
        self.counters.record_updated();
    }

    /// Count a DELETE_FILE that backed up an existing file.
    pub fn record_deleted(&mut self) {
        self.counters.record_deleted();
    }

    /// Zero the counters.
    pub fn reset(&mut self) {
        self.counters = ManifestCounters::default();
    }

    /// Compare the device counters with a MANIFEST payload.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::ManifestParse`] if the payload cannot be parsed
    /// and [`OtaError::ManifestMismatch`] if any counter differs.
    pub fn reconcile(&self, body: &str) -> OtaResult<ManifestCounters> {
        let declared = ManifestCounters::parse(body)
            .map_err(|e| OtaError::ManifestParse(e.to_string()))?;

        if declared != self.counters {
            return Err(OtaError::ManifestMismatch {
                expected: declared,
                actual: self.counters,
            });
        }
        Ok(declared)
    }
}
