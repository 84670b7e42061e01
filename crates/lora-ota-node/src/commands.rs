//! Operator subcommands that inspect or repair the device root without
//! running the radio.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use lora_ota_update::FileTransactionManager;
use lora_ota_versioning::compare;
use serde::Serialize;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::node::{read_device_version, revert_pending};

/// One pending artifact, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingArtifact {
    pub kind: &'static str,
    pub path: PathBuf,
}

/// Device root status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub device_root: PathBuf,
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_error: Option<String>,
    pub pending: Vec<PendingArtifact>,
}

impl StatusReport {
    /// Whether an interrupted update left changes behind.
    #[must_use]
    pub fn update_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("device root: {}\n", self.device_root.display());
        match (&self.version, &self.version_error) {
            (Some(version), _) => out.push_str(&format!("version:     {version}\n")),
            (None, Some(error)) => out.push_str(&format!("version:     unknown ({error})\n")),
            (None, None) => out.push_str("version:     unknown\n"),
        }
        if self.pending.is_empty() {
            out.push_str("pending:     none\n");
        } else {
            out.push_str(&format!("pending:     {} artifact(s)\n", self.pending.len()));
            for artifact in &self.pending {
                out.push_str(&format!("  {:<4} {}\n", artifact.kind, artifact.path.display()));
            }
        }
        out
    }
}

/// Inspect the device root.
///
/// # Errors
///
/// Returns an error if the device root cannot be walked.
pub fn status(config: &NodeConfig) -> Result<StatusReport, NodeError> {
    let root = &config.agent.device_root;
    let files = FileTransactionManager::new(root);
    let pending = files
        .pending_artifacts()?
        .into_iter()
        .map(|artifact| PendingArtifact {
            kind: artifact.kind.suffix(),
            path: relative_to(root, &artifact.path),
        })
        .collect();

    let (version, version_error) = match read_device_version(&config.version_path()) {
        Ok(version) => (Some(version.as_str().to_string()), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(StatusReport {
        device_root: root.clone(),
        version,
        version_error,
        pending,
    })
}

/// Revert pending changes and describe what was done.
///
/// # Errors
///
/// Returns an error if the revert could not complete.
pub fn revert(config: &NodeConfig) -> Result<String, NodeError> {
    let report = revert_pending(&config.agent.device_root)?;
    if report.is_empty() {
        return Ok("nothing to revert".to_string());
    }
    Ok(format!(
        "reverted: {} restored, {} removed, {} temp files discarded",
        report.restored, report.removed, report.discarded
    ))
}

/// Order two version strings the way the engine does.
///
/// # Errors
///
/// Returns an error if either string is not a valid version.
pub fn check_version(current: &str, candidate: &str) -> Result<&'static str, NodeError> {
    let ordering = compare(candidate, current)?;
    Ok(match ordering {
        Ordering::Greater => "newer",
        Ordering::Equal => "same",
        Ordering::Less => "older",
    })
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_ota_update::AgentConfig;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn config_for(root: &Path) -> NodeConfig {
        NodeConfig {
            agent: AgentConfig::with_root(root),
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_status_lists_pending_artifacts() -> TestResult {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("version.py"), "1.2.0\n")?;
        std::fs::create_dir_all(dir.path().join("lib"))?;
        std::fs::write(dir.path().join("lib/new.py.del"), "")?;
        std::fs::write(dir.path().join("main.py.bak"), "old")?;

        let report = status(&config_for(dir.path()))?;
        assert_eq!(report.version.as_deref(), Some("1.2.0"));
        assert!(report.update_pending());
        assert_eq!(
            report.pending,
            vec![
                PendingArtifact {
                    kind: "del",
                    path: PathBuf::from("lib/new.py.del"),
                },
                PendingArtifact {
                    kind: "bak",
                    path: PathBuf::from("main.py.bak"),
                },
            ]
        );
        assert!(report.render().contains("pending:     2 artifact(s)"));
        Ok(())
    }

    #[test]
    fn test_status_without_version_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let report = status(&config_for(dir.path()))?;
        assert_eq!(report.version, None);
        assert!(report.version_error.is_some());
        assert!(!report.update_pending());
        assert!(report.render().contains("version:     unknown"));
        Ok(())
    }

    #[test]
    fn test_revert_reports_nothing_on_clean_root() -> TestResult {
        let dir = tempfile::tempdir()?;
        assert_eq!(revert(&config_for(dir.path()))?, "nothing to revert");
        Ok(())
    }

    #[test]
    fn test_check_version() -> TestResult {
        assert_eq!(check_version("1.0.0", "1.0.1")?, "newer");
        assert_eq!(check_version("1.0", "1.0")?, "same");
        assert_eq!(check_version("1.0.0", "1.0")?, "older");
        assert!(matches!(
            check_version("1.0", "1.a"),
            Err(NodeError::InvalidVersion(_))
        ));
        Ok(())
    }
}
