//! Firmware version type and comparison helpers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error type for firmware version parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Version string is empty
    #[error("empty version string")]
    Empty,

    /// Version component is not a non-negative integer
    #[error("invalid version component '{component}': {reason}")]
    InvalidComponent {
        /// The offending component text
        component: String,
        /// Why it was rejected
        reason: String,
    },
}

impl VersionError {
    fn invalid_component(component: &str, reason: impl Into<String>) -> Self {
        Self::InvalidComponent {
            component: component.to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for version parsing.
pub type VersionResult<T> = Result<T, VersionError>;

/// A parsed dotted firmware version.
///
/// Equality and ordering look at the numeric components only, so `"01.2"`
/// and `"1.2"` compare equal while keeping their original spelling for
/// display.
#[derive(Debug, Clone)]
pub struct FirmwareVersion {
    original: String,
    components: Vec<u64>,
}

impl FirmwareVersion {
    /// Parse a version string like `"1"`, `"1.2"` or `"1.2.3"`.
    ///
    /// Surrounding whitespace is ignored. Every component must fit in a `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Empty`] for an empty string and
    /// [`VersionError::InvalidComponent`] when a component is empty or not an
    /// unsigned integer.
    pub fn parse(s: &str) -> VersionResult<Self> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut components = Vec::new();

        for part in trimmed.split('.') {
            if part.is_empty() {
                return Err(VersionError::invalid_component(part, "empty component"));
            }

            // `u64::from_str` accepts a leading '+', which is not a version digit.
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::invalid_component(part, "not an integer"));
            }

            let num = part
                .parse::<u64>()
                .map_err(|e| VersionError::invalid_component(part, e.to_string()))?;

            components.push(num);
        }

        Ok(Self {
            original: trimmed.to_string(),
            components,
        })
    }

    /// Get the version string as it was received (trimmed)
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Get the numeric components
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Slice ordering is component-wise and ranks a strict prefix lower,
        // which is exactly "absent < any component".
        self.components.as_slice().cmp(other.components.as_slice())
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for FirmwareVersion {}

impl FromStr for FirmwareVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Compare two version strings.
///
/// `Ordering::Greater` means `a` is newer than `b`. Callers that speak the
/// `{-1, 0, 1}` convention can cast with `as i8`.
///
/// # Errors
///
/// Fails when either string is not a valid version. Callers must read that
/// as "cannot determine ordering", never as "newer".
pub fn compare(a: &str, b: &str) -> VersionResult<Ordering> {
    let va = FirmwareVersion::parse(a)?;
    let vb = FirmwareVersion::parse(b)?;
    Ok(va.cmp(&vb))
}

/// Whether `candidate` is strictly newer than `current`.
///
/// # Errors
///
/// Propagates parse failures of either argument.
pub fn is_newer(candidate: &str, current: &str) -> VersionResult<bool> {
    Ok(compare(candidate, current)? == Ordering::Greater)
}
