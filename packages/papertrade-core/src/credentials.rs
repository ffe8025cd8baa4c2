//! Durable storage for the session token and the current user.

use crate::types::User;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// On-disk layout: the two persisted entries.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Credential store that persists the token and user to a JSON file.
///
/// Only the session store writes here.
#[derive(Debug)]
pub struct CredentialStore {
    /// Path to the credentials file; empty for in-memory stores
    path: PathBuf,
    stored: StoredCredentials,
}

impl CredentialStore {
    /// Create a store at the default path, loading anything already saved.
    ///
    /// Default path: `~/.papertrade/credentials.json`
    /// Can be overridden with `PAPERTRADE_CREDENTIALS_FILE` environment variable.
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    /// Create a store with a custom path.
    ///
    /// A corrupt file is treated as empty; the next save overwrites it.
    pub fn with_path(path: PathBuf) -> Self {
        let stored = Self::load_from_path(&path).unwrap_or_default();
        Self { path, stored }
    }

    /// Create an in-memory store (no persistence).
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            stored: StoredCredentials::default(),
        }
    }

    /// Get the default credentials file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("PAPERTRADE_CREDENTIALS_FILE") {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".papertrade/credentials.json"))
            .unwrap_or_else(|| PathBuf::from("credentials.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    fn load_from_path(path: &PathBuf) -> Result<StoredCredentials> {
        if !path.exists() {
            return Ok(StoredCredentials::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.stored)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.stored.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.stored.user.as_ref()
    }

    pub fn stored(&self) -> &StoredCredentials {
        &self.stored
    }

    /// Persist both entries together.
    pub fn save(&mut self, token: &str, user: &User) -> Result<()> {
        self.stored.token = Some(token.to_string());
        self.stored.user = Some(user.clone());
        self.write()
    }

    /// Persist an updated user, keeping the token.
    pub fn save_user(&mut self, user: &User) -> Result<()> {
        self.stored.user = Some(user.clone());
        self.write()
    }

    /// Remove both entries.
    ///
    /// In-memory state is always cleared, even if removing the file fails.
    pub fn clear(&mut self) -> Result<()> {
        self.stored = StoredCredentials::default();
        if self.is_in_memory() || !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
