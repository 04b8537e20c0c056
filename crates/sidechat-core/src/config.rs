//! Engine configuration.
//!
//! `SyncConfig` is deserialized from the `[sync]` table of `config.toml`
//! (see `sidechat-infrastructure::config_service`). Every field has a default
//! so a partial or missing file is valid.

use crate::identity::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root of the configuration file.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Timing, remote and logging settings for the synchronization engine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether sessions are written to and fetched from the remote service.
    pub remote_enabled: bool,
    /// Base URL of the remote session service.
    pub base_url: Option<String>,
    /// Bearer token sent with every remote request.
    pub api_token: Option<String>,
    /// Minimum interval between background flushes.
    pub save_throttle_ms: u64,
    /// Window in which a repeated activation fetch for the same id is skipped.
    pub fetch_cache_ms: u64,
    /// Sessions younger than this are not refetched on activation.
    pub new_session_grace_ms: u64,
    /// Minimum interval between `last_access_time` updates.
    pub access_throttle_secs: u64,
    /// Attempts made by the retry queue before a write is dropped.
    pub retry_max_attempts: u32,
    /// Base delay of the retry queue's exponential backoff.
    pub retry_base_delay_ms: u64,
    /// Per-request timeout for the HTTP client.
    pub request_timeout_secs: u64,
    /// Hash used to derive local session ids from URLs.
    pub hash_algorithm: HashAlgorithm,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_enabled: true,
            base_url: None,
            api_token: None,
            save_throttle_ms: 1000,
            fetch_cache_ms: 2000,
            new_session_grace_ms: 5000,
            access_throttle_secs: 60,
            retry_max_attempts: 5,
            retry_base_delay_ms: 500,
            request_timeout_secs: 10,
            hash_algorithm: HashAlgorithm::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn save_throttle(&self) -> Duration {
        Duration::from_millis(self.save_throttle_ms)
    }

    pub fn fetch_cache_window(&self) -> Duration {
        Duration::from_millis(self.fetch_cache_ms)
    }

    pub fn new_session_grace(&self) -> Duration {
        Duration::from_millis(self.new_session_grace_ms)
    }

    pub fn access_throttle(&self) -> Duration {
        Duration::from_secs(self.access_throttle_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Backoff before retry `attempt` (1-based), doubling per attempt and capped at 30s.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(6);
        let delay = self.retry_base_delay_ms.saturating_mul(1 << exp);
        Duration::from_millis(delay.min(30_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RootConfig = toml::from_str(
            r#"
            [sync]
            save_throttle_ms = 250
            hash_algorithm = "fallback"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.save_throttle(), Duration::from_millis(250));
        assert_eq!(config.sync.hash_algorithm, HashAlgorithm::Fallback);
        assert_eq!(config.sync.fetch_cache_ms, 2000);
        assert!(config.sync.remote_enabled);
    }

    #[test]
    fn retry_backoff_doubles_and_caps() {
        let config = SyncConfig::default();
        assert_eq!(config.retry_backoff(1), Duration::from_millis(500));
        assert_eq!(config.retry_backoff(2), Duration::from_millis(1000));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(2000));
        assert_eq!(config.retry_backoff(20), Duration::from_millis(30_000));
    }
}
