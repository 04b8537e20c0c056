//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the root configuration
//! from the configuration file (~/.config/sidechat/config.toml) and applies
//! environment overrides on top of it.

use crate::paths::SidechatPaths;
use sidechat_core::config::{RootConfig, SyncConfig};
use sidechat_core::error::{Result, SidechatError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

pub const ENV_BASE_URL: &str = "SIDECHAT_BASE_URL";
pub const ENV_API_TOKEN: &str = "SIDECHAT_API_TOKEN";
pub const ENV_REMOTE_ENABLED: &str = "SIDECHAT_REMOTE_ENABLED";

/// Configuration service that loads and caches the root configuration.
///
/// A missing file yields the defaults; a malformed file is logged and also
/// yields the defaults, so the engine always starts.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Explicit file location; `None` resolves the platform path.
    path: Option<PathBuf>,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<RootConfig>>>,
}

impl ConfigService {
    /// Creates a ConfigService reading the platform config file.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a ConfigService reading `path` instead of the platform file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the root configuration, loading from file if not cached.
    pub fn get_config(&self) -> RootConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let mut loaded = self.load_config().unwrap_or_else(|e| {
            tracing::warn!("[ConfigService] Using default configuration: {}", e);
            RootConfig::default()
        });
        apply_env_overrides(&mut loaded.sync, |name| std::env::var(name).ok());

        {
            let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Shortcut for the `[sync]` table.
    pub fn sync_config(&self) -> SyncConfig {
        self.get_config().sync
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = None;
    }

    /// Parses a configuration document without touching the file system or
    /// the environment.
    pub fn load_from_str(content: &str) -> Result<RootConfig> {
        if content.trim().is_empty() {
            return Ok(RootConfig::default());
        }
        Ok(toml::from_str(content)?)
    }

    fn load_config(&self) -> Result<RootConfig> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => SidechatPaths::config_file()?,
        };
        Self::load_file(&path)
    }

    fn load_file(path: &Path) -> Result<RootConfig> {
        if !path.exists() {
            tracing::debug!("[ConfigService] {} not found, using defaults", path.display());
            return Ok(RootConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::load_from_str(&content).map_err(|e| {
            SidechatError::config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        tracing::debug!("[ConfigService] Loaded {}", path.display());
        Ok(config)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies `SIDECHAT_*` overrides looked up through `lookup`.
///
/// Empty values are ignored. `SIDECHAT_REMOTE_ENABLED` accepts
/// `1/0`, `true/false`, `yes/no` and `on/off`.
pub fn apply_env_overrides<F>(config: &mut SyncConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(base_url) = non_empty(ENV_BASE_URL) {
        config.base_url = Some(base_url.trim().to_string());
    }
    if let Some(token) = non_empty(ENV_API_TOKEN) {
        config.api_token = Some(token.trim().to_string());
    }
    if let Some(flag) = non_empty(ENV_REMOTE_ENABLED) {
        match flag.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.remote_enabled = true,
            "0" | "false" | "no" | "off" => config.remote_enabled = false,
            other => {
                tracing::warn!("[ConfigService] Ignoring {}={}", ENV_REMOTE_ENABLED, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ConfigService::load_from_str("  \n").unwrap(), RootConfig::default());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = ConfigService::load_from_str("[sync\nsave_throttle_ms = ").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = ConfigService::load_from_str(
            r#"
            [sync]
            base_url = "https://file.test"
            remote_enabled = true
            "#,
        )
        .unwrap()
        .sync;

        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_BASE_URL, "https://env.test"),
                (ENV_API_TOKEN, " secret "),
                (ENV_REMOTE_ENABLED, "off"),
            ]),
        );

        assert_eq!(config.base_url.as_deref(), Some("https://env.test"));
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert!(!config.remote_enabled);
    }

    #[test]
    fn unknown_flag_and_empty_values_are_ignored() {
        let mut config = SyncConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[(ENV_REMOTE_ENABLED, "maybe"), (ENV_BASE_URL, "  ")]),
        );
        assert!(config.remote_enabled);
        assert_eq!(config.base_url, None);
    }

    #[test]
    fn file_is_loaded_and_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nsave_throttle_ms = 250\n").unwrap();

        let service = ConfigService::with_path(&path);
        assert_eq!(service.sync_config().save_throttle_ms, 250);

        std::fs::write(&path, "[sync]\nsave_throttle_ms = 750\n").unwrap();
        assert_eq!(service.sync_config().save_throttle_ms, 250);

        service.invalidate_cache();
        assert_eq!(service.sync_config().save_throttle_ms, 750);
    }

    #[test]
    fn missing_or_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let missing = ConfigService::with_path(dir.path().join("absent.toml"));
        assert_eq!(missing.sync_config().save_throttle_ms, 1000);

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert_eq!(ConfigService::with_path(&path).sync_config().fetch_cache_ms, 2000);
    }
}
