//! Node configuration loaded from YAML.
//!
//! ```yaml
//! version_file: version.py
//! agent:
//!   device_root: /flash
//!   inactivity_timeout_secs: 60
//! radio:
//!   listen: 0.0.0.0:1700
//!   gateway: 10.0.0.1:1700
//! app:
//!   uplink_interval_secs: 5
//! ```

use std::path::{Path, PathBuf};

use lora_ota_update::AgentConfig;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// UDP radio stand-in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Local address the node receives frames on.
    pub listen: String,
    /// Address uplink frames are sent to.
    pub gateway: String,
    /// Inbound OTA frames buffered before the receiver waits.
    pub queue_depth: usize,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:1700".to_string(),
            gateway: "127.0.0.1:1701".to_string(),
            queue_depth: 64,
        }
    }
}

/// Application traffic sharing the radio with OTA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds between application uplinks, `0` disables them.
    pub uplink_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            uplink_interval_secs: 5,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// File below the device root holding the running version.
    pub version_file: String,
    /// Start with the device clock unset, as after a cold boot without RTC.
    pub clock_starts_unset: bool,
    /// Stop after this many boots; unlimited when absent.
    pub max_boots: Option<u32>,
    pub agent: AgentConfig,
    pub radio: RadioConfig,
    pub app: AppConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            version_file: "version.py".to_string(),
            clock_starts_unset: false,
            max_boots: None,
            agent: AgentConfig::default(),
            radio: RadioConfig::default(),
            app: AppConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this schema
    /// or the result does not validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, NodeError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or return the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|source| NodeError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&yaml)
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply command line overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(root) = &overrides.device_root {
            self.agent.device_root.clone_from(root);
        }
        if let Some(listen) = &overrides.listen {
            self.radio.listen.clone_from(listen);
        }
        if let Some(gateway) = &overrides.gateway {
            self.radio.gateway.clone_from(gateway);
        }
        if overrides.max_boots.is_some() {
            self.max_boots = overrides.max_boots;
        }
    }

    /// Path of the version file.
    #[must_use]
    pub fn version_path(&self) -> PathBuf {
        self.agent.device_root.join(&self.version_file)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::InvalidConfiguration`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.version_file.trim().is_empty() {
            return Err(NodeError::InvalidConfiguration(
                "version_file must not be empty".to_string(),
            ));
        }
        if self.radio.queue_depth == 0 {
            return Err(NodeError::InvalidConfiguration(
                "radio.queue_depth must be at least 1".to_string(),
            ));
        }
        self.agent
            .validate()
            .map_err(|e| NodeError::InvalidConfiguration(e.to_string()))
    }
}

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub device_root: Option<PathBuf>,
    pub listen: Option<String>,
    pub gateway: Option<String>,
    pub max_boots: Option<u32>,
}
