//! Manifest counters exchanged at the end of a session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Count of each kind of file operation in a session.
///
/// The wire form names the update and delete counters `update` and
/// `delete`; the longer names are accepted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCounters {
    /// Files created by the session
    pub new: u32,
    /// Existing files patched by the session
    #[serde(rename = "update", alias = "updated")]
    pub updated: u32,
    /// Files removed by the session
    #[serde(rename = "delete", alias = "deleted")]
    pub deleted: u32,
}

impl ManifestCounters {
    /// Build counters from explicit values.
    #[must_use]
    pub fn new(new: u32, updated: u32, deleted: u32) -> Self {
        Self {
            new,
            updated,
            deleted,
        }
    }

    /// Parse the JSON object embedded in a MANIFEST payload.
    ///
    /// Anything before the first `{` or after the last `}` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidManifest`] when no object is present,
    /// a counter is missing, or a value is not a non-negative integer.
    pub fn parse(body: &str) -> ProtocolResult<Self> {
        let start = body
            .find('{')
            .ok_or_else(|| ProtocolError::invalid_manifest("no opening brace"))?;
        let end = body
            .rfind('}')
            .ok_or_else(|| ProtocolError::invalid_manifest("no closing brace"))?;
        let object = body
            .get(start..=end)
            .ok_or_else(|| ProtocolError::invalid_manifest("braces out of order"))?;

        serde_json::from_str(object).map_err(|e| ProtocolError::invalid_manifest(e.to_string()))
    }

    /// Wire form of the counters.
    #[must_use]
    pub fn to_payload(&self) -> String {
        format!(
            "{{\"new\":{},\"update\":{},\"delete\":{}}}",
            self.new, self.updated, self.deleted
        )
    }

    /// Record a newly created file.
    pub fn record_new(&mut self) {
        self.new = self.new.saturating_add(1);
    }

    /// Record a patched existing file.
    pub fn record_updated(&mut self) {
        self.updated = self.updated.saturating_add(1);
    }

    /// Record a deleted file.
    pub fn record_deleted(&mut self) {
        self.deleted = self.deleted.saturating_add(1);
    }

    /// Total number of file operations.
    #[must_use]
    pub fn total(&self) -> u64 {
        u64::from(self.new) + u64::from(self.updated) + u64::from(self.deleted)
    }
}

impl fmt::Display for ManifestCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={} updated={} deleted={}",
            self.new, self.updated, self.deleted
        )
    }
}
