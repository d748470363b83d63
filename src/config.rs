//! Runtime configuration
//!
//! Read from `ridesync.toml` in a config directory. Every field has a
//! default, so a missing file is not an error.
//!
//! ## Environment Variables
//!
//! - `RIDESYNC_DATA_DIR` - Directory of the embedded store
//! - `RIDESYNC_API_URL` - Backend base URL
//! - `RIDESYNC_API_TOKEN` - Bearer token for the backend
//!
//! These can be set in a `.env` file in the config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::SyncResult;
use crate::location::{ProviderOptions, MAX_PERSISTED_LOCATIONS};
use crate::sync::{SyncConfig, GIVE_UP_THRESHOLD};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "ridesync.toml";

pub const ENV_DATA_DIR: &str = "RIDESYNC_DATA_DIR";
pub const ENV_API_URL: &str = "RIDESYNC_API_URL";
pub const ENV_API_TOKEN: &str = "RIDESYNC_API_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub location: LocationSettings,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional bearer token
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Path probed to confirm internet reachability
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_probe_interval_ms() -> u64 {
    15_000
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            remote_timeout_ms: default_remote_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_interval_ms: default_probe_interval_ms(),
            health_path: default_health_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_give_up_threshold")]
    pub give_up_threshold: u32,
}

fn default_give_up_threshold() -> u32 {
    GIVE_UP_THRESHOLD
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            give_up_threshold: default_give_up_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSettings {
    #[serde(default = "default_max_persisted")]
    pub max_persisted: usize,
    /// Silence after which the capture task counts as dead
    #[serde(default = "default_health_max_silence_ms")]
    pub health_max_silence_ms: i64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub distance_filter_m: f64,
    #[serde(default)]
    pub pauses_when_stationary: bool,
}

fn default_max_persisted() -> usize {
    MAX_PERSISTED_LOCATIONS
}

fn default_health_max_silence_ms() -> i64 {
    5 * 60 * 1000
}

fn default_interval_ms() -> u64 {
    333
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            max_persisted: default_max_persisted(),
            health_max_silence_ms: default_health_max_silence_ms(),
            interval_ms: default_interval_ms(),
            distance_filter_m: 0.0,
            pauses_when_stationary: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api: ApiConfig::default(),
            sync: SyncSettings::default(),
            location: LocationSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from a directory
    ///
    /// This also loads any `.env` file in the directory and applies
    /// environment variable overrides.
    pub fn load(dir: &Path) -> SyncResult<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)?
        } else {
            debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, dir.display());
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(content: &str) -> SyncResult<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var(ENV_DATA_DIR) {
            if !data_dir.is_empty() {
                self.data_dir = PathBuf::from(data_dir);
            }
        }

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.is_empty() {
                self.api.base_url = url;
            }
        }

        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.is_empty() {
                self.api.token = token;
            }
        }
    }

    pub fn has_auth(&self) -> bool {
        !self.api.token.is_empty()
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.api.remote_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.api.probe_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.api.probe_interval_ms)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            give_up_threshold: self.sync.give_up_threshold,
            remote_timeout: self.remote_timeout(),
        }
    }

    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            interval_ms: self.location.interval_ms,
            distance_filter_m: self.location.distance_filter_m,
            pauses_when_stationary: self.location.pauses_when_stationary,
        }
    }
}
