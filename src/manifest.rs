//! Declaration and state files
//!
//! The declaration (YAML) names the keys that should exist, keyed by address.
//! The state file (JSON) remembers what was created for each address,
//! including the one-time secret, so it is written with owner-only
//! permissions.

use crate::resource::{DesiredKey, ObservedKey};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current state file format
const STATE_VERSION: u32 = 1;

/// Desired keys by address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    #[serde(default)]
    pub keys: BTreeMap<String, DesiredKey>,
}

impl Declaration {
    /// Load and validate a YAML declaration
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read declaration {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid declaration {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let declaration: Self = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        declaration.validate()?;
        Ok(declaration)
    }

    /// Reject values the API would refuse anyway
    pub fn validate(&self) -> Result<()> {
        for (address, key) in &self.keys {
            if address.trim().is_empty() {
                bail!("key address must not be empty");
            }
            if key.name.trim().is_empty() {
                bail!("{}: name must not be empty", address);
            }
            if let Some(limit) = key.limit {
                if !limit.is_finite() || limit < 0.0 {
                    bail!("{}: limit must be a non-negative number, got {}", address, limit);
                }
            }
            if key.limit_minutes == Some(0) {
                bail!("{}: limit_minutes must be greater than zero", address);
            }
        }
        Ok(())
    }
}

/// Observed keys by address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub keys: BTreeMap<String, ObservedKey>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            keys: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load state. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state {:?}", path))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state {:?}", path))?;

        if state.version > STATE_VERSION {
            bail!(
                "State {:?} has version {}, this build understands up to {}",
                path,
                state.version,
                STATE_VERSION
            );
        }
        Ok(state)
    }

    /// Write state through a temp file and rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        write_private(&tmp, content.as_bytes())
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;

        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}
