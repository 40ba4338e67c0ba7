//! Configuration schema for nix-cachefs
//!
//! Configuration is stored at `~/.config/nix-cachefs/config.toml`

use crate::error::CacheFsResult;
use crate::mirror::Mirror;
use crate::options::FsOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The public NixOS binary cache
pub const DEFAULT_MIRROR: &str = "https://cache.nixos.org";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Binary cache settings
    pub cache: CacheConfig,

    /// HTTP client settings
    pub http: HttpConfig,
}

impl Config {
    /// Parse the configured mirrors, in priority order
    pub fn mirrors(&self) -> CacheFsResult<Vec<Mirror>> {
        self.cache.mirrors.iter().map(|m| Mirror::parse(m)).collect()
    }

    /// Filesystem options described by this configuration
    pub fn fs_options(&self) -> FsOptions {
        let mut options =
            FsOptions::default().with_timeout(Duration::from_secs(self.http.timeout_secs));
        if let Some(netrc) = &self.http.netrc_file {
            options = options.with_netrc_file(netrc);
        }
        if let Some(dir) = &self.cache.persistent_dir {
            options = options.with_persistent_cache(dir);
        }
        if let Some(dir) = &self.cache.temp_dir {
            options = options.with_temp_dir(dir);
        }
        options
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Binary cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Mirror base URLs, highest priority first
    pub mirrors: Vec<String>,

    /// Keep fetched narinfo and NAR files here across runs
    pub persistent_dir: Option<PathBuf>,

    /// Directory for unpacked archives (default: system temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mirrors: vec![DEFAULT_MIRROR.to_string()],
            persistent_dir: None,
            temp_dir: None,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Global timeout per request in seconds
    pub timeout_secs: u64,

    /// netrc file with credentials for private caches
    pub netrc_file: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            netrc_file: None,
        }
    }
}
