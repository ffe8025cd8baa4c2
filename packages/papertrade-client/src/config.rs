//! Client configuration.
//!
//! Loaded from `~/.papertrade/config.toml` (or `PAPERTRADE_CONFIG`), then
//! overridden by environment variables.

use crate::{Error, Result};
use papertrade_core::CredentialStore;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin, without the API prefix
    pub base_url: String,
    pub api_prefix: String,
    /// No timeout when unset
    pub request_timeout_secs: Option<u64>,
    /// Candle resolution requested by symbol selection
    pub history_resolution: String,
    pub history_limit: u32,
    pub credentials_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout_secs: None,
            history_resolution: "D".to_string(),
            history_limit: 100,
            credentials_file: None,
        }
    }
}

impl ClientConfig {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::default_path())?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("PAPERTRADE_CONFIG") {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".papertrade/config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply `PAPERTRADE_API_URL` and `PAPERTRADE_CREDENTIALS_FILE`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PAPERTRADE_API_URL") {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        if let Some(path) = lookup("PAPERTRADE_CREDENTIALS_FILE") {
            if !path.trim().is_empty() {
                self.credentials_file = Some(PathBuf::from(path));
            }
        }
    }

    /// Base URL every gateway path is appended to.
    pub fn api_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, prefix)
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_file
            .clone()
            .unwrap_or_else(CredentialStore::default_path)
    }
}
