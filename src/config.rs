//! Configuration Management
//!
//! Handles persistent configuration storage for orkeys. The credential is
//! never written here; it comes from `--api-key` or `OPENROUTER_API_KEY`.

use crate::api::http::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the provisioning credential
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Environment variable overriding the API endpoint
pub const ENDPOINT_ENV: &str = "OPENROUTER_ENDPOINT";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// API endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("orkeys").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from disk. Missing or unreadable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to disk
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective endpoint (CLI/env > config > default)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> String {
        cli.filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .or_else(|| self.endpoint.clone().filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Get effective timeout (CLI > config > default)
    pub fn effective_timeout(&self, cli: Option<u64>) -> Duration {
        cli.or(self.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Resolve everything the API client needs
    pub fn client_config(
        &self,
        api_key: Option<&str>,
        endpoint: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Result<ClientConfig> {
        let Some(api_key) = api_key.map(str::trim).filter(|k| !k.is_empty()) else {
            bail!("Missing OpenRouter API key. Pass --api-key or set {}.", API_KEY_ENV);
        };

        let endpoint = self.effective_endpoint(endpoint);
        Ok(ClientConfig::new(api_key)
            .with_base_url(Some(&endpoint))
            .with_timeout(self.effective_timeout(timeout_secs)))
    }
}
