//! Path management for Sidechat configuration and cache files.
//!
//! ```text
//! ~/.config/sidechat/          # Config directory
//! └── config.toml              # Engine configuration
//!
//! ~/.cache/sidechat/           # Cache directory
//! └── sessions.json            # Local session cache
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "sidechat";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// No platform config directory could be determined.
    ConfigDirNotFound,
    /// No platform cache directory could be determined.
    CacheDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
            PathError::CacheDirNotFound => write!(f, "Cannot find cache directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for sidechat_core::SidechatError {
    fn from(err: PathError) -> Self {
        sidechat_core::SidechatError::config(err.to_string())
    }
}

/// Platform paths for Sidechat, resolved through `dirs`.
pub struct SidechatPaths;

impl SidechatPaths {
    /// Returns the Sidechat configuration directory (e.g. `~/.config/sidechat/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the Sidechat cache directory (e.g. `~/.cache/sidechat/`).
    pub fn cache_dir() -> Result<PathBuf, PathError> {
        dirs::cache_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::CacheDirNotFound)
    }

    /// Returns the path to `config.toml`.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path of the local session cache.
    pub fn session_cache_file() -> Result<PathBuf, PathError> {
        Ok(Self::cache_dir()?.join("sessions.json"))
    }
}
