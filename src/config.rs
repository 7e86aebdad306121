// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Application configuration
//!
//! Configuration is static: it is read once at start (JSON file, then
//! `PARADISE_*` environment overrides) and handed to [`crate::storage::open_backend`].
//!
//! # Environment Overrides
//! - `PARADISE_DB_MODE` - `local` or `remote`
//! - `PARADISE_REMOTE_URL` - remote project URL
//! - `PARADISE_REMOTE_KEY` - remote anonymous key
//! - `PARADISE_DATA_PATH` - SQLite file backing the local store

use crate::error::{ParadiseError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default image size ceiling (5 MiB)
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Default request timeout for the remote backend in seconds
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Which storage backend the facade talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbMode {
    #[default]
    Local,
    Remote,
}

impl FromStr for DbMode {
    type Err = ParadiseError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "supabase" => Ok(Self::Remote),
            other => Err(ParadiseError::InvalidConfiguration(format!("Unknown db mode '{}'", other))),
        }
    }
}

/// Remote table store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Anonymous API key, sent as `apikey` and bearer token
    pub anon_key: String,
    pub timeout_secs: u64,
    /// Object storage bucket for uploaded images
    pub images_bucket: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            images_bucket: "images".to_string(),
        }
    }
}

impl RemoteConfig {
    /// Both URL and key are required before remote mode is used
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Upload validation rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePolicy {
    pub max_size: u64,
    pub allowed_types: Vec<String>,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_IMAGE_SIZE,
            allowed_types: ["image/jpeg", "image/png", "image/jpg", "image/webp"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl ImagePolicy {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub db_mode: DbMode,
    pub remote: RemoteConfig,
    pub images: ImagePolicy,
    /// SQLite file that backs the local key/value store
    pub data_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Readers Paradise".to_string(),
            db_mode: DbMode::Local,
            remote: RemoteConfig::default(),
            images: ImagePolicy::default(),
            data_path: default_data_path(),
        }
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Load configuration from a JSON file (if it exists) and apply
    /// environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => {
                let raw = std::fs::read_to_string(p.as_ref()).map_err(|e| {
                    ParadiseError::FileIoError(format!(
                        "Failed to read config {}: {}",
                        p.as_ref().display(),
                        e
                    ))
                })?;
                serde_json::from_str::<AppConfig>(&raw).map_err(|e| {
                    ParadiseError::InvalidConfiguration(format!(
                        "{}: {}",
                        p.as_ref().display(),
                        e
                    ))
                })?
            }
            _ => AppConfig::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `PARADISE_*` overrides using the given variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("PARADISE_DB_MODE") {
            self.db_mode = mode.parse()?;
        }
        if let Some(url) = lookup("PARADISE_REMOTE_URL") {
            self.remote.url = url;
        }
        if let Some(key) = lookup("PARADISE_REMOTE_KEY") {
            self.remote.anon_key = key;
        }
        if let Some(path) = lookup("PARADISE_DATA_PATH") {
            self.data_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Backend that will actually be used
    ///
    /// Remote mode without both URL and key falls back to local.
    pub fn effective_mode(&self) -> DbMode {
        match self.db_mode {
            DbMode::Remote if self.remote.is_complete() => DbMode::Remote,
            _ => DbMode::Local,
        }
    }
}

/// Builder for AppConfig
#[derive(Debug)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn db_mode(mut self, mode: DbMode) -> Self {
        self.config.db_mode = mode;
        self
    }

    pub fn remote<S: Into<String>>(mut self, url: S, anon_key: S) -> Self {
        self.config.remote.url = url.into();
        self.config.remote.anon_key = anon_key.into();
        self
    }

    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.config.remote.timeout_secs = timeout.as_secs();
        self
    }

    pub fn max_image_size(mut self, max_size: u64) -> Self {
        self.config.images.max_size = max_size;
        self
    }

    pub fn allowed_image_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.images.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn data_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.data_path = path.into();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Get default data path for the platform
///
/// - macOS: ~/Library/Application Support/ReadersParadise/paradise.db
/// - Linux: ~/.local/share/ReadersParadise/paradise.db
/// - Windows: %APPDATA%/ReadersParadise/paradise.db
pub fn default_data_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("ReadersParadise")
            .join("paradise.db")
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("ReadersParadise")
            .join("paradise.db")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("ReadersParadise").join("paradise.db")
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("./paradise.db")
    }
}
